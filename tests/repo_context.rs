// Repository context comes from the environment at invocation time. This
// lives in its own test binary so the env mutation cannot race other tests.

use zotero_feed::config::RepoContext;

#[test]
fn repo_context_reads_the_environment() {
    std::env::set_var("GITHUB_USERNAME", "octocat");
    std::env::set_var("REPO_NAME", "institut-zotero-feed");

    let context = RepoContext::from_env().unwrap();
    assert_eq!(context.owner, "octocat");
    assert_eq!(context.repo_name, "institut-zotero-feed");

    std::env::remove_var("GITHUB_USERNAME");
    let err = RepoContext::from_env().unwrap_err();
    assert!(err.to_string().contains("GITHUB_USERNAME"));

    std::env::set_var("GITHUB_USERNAME", "octocat");
    std::env::remove_var("REPO_NAME");
    let err = RepoContext::from_env().unwrap_err();
    assert!(err.to_string().contains("REPO_NAME"));

    std::env::remove_var("GITHUB_USERNAME");
}
