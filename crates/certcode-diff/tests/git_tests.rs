use std::fs;
use std::path::Path;

use certcode_diff::{parse_diff, GitDiff, GitError, Language};
use git2::{Repository, Signature};
use tempfile::TempDir;

/// Helper: write a file and commit it on top of HEAD.
fn commit_file(
    repo: &Repository,
    rel_path: &str,
    content: impl AsRef<[u8]>,
    message: &str,
) -> git2::Oid {
    let workdir = repo.workdir().unwrap();
    let full = workdir.join(rel_path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&full, content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(rel_path)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();

    let sig = Signature::now("Test Author", "author@example.com").unwrap();
    let parents = match repo.head() {
        Ok(head) => vec![head.peel_to_commit().unwrap()],
        Err(_) => vec![],
    };
    let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
        .unwrap()
}

/// Helper: repo with two commits touching `src/app.py`.
fn create_repo() -> (TempDir, Repository) {
    let dir = TempDir::new().unwrap();
    let repo = Repository::init(dir.path()).unwrap();

    commit_file(
        &repo,
        "src/app.py",
        "def main():\n    pass\n",
        "Initial commit",
    );
    commit_file(
        &repo,
        "src/app.py",
        "def main():\n    print(\"hi\")\n    return 0\n",
        "Print a greeting",
    );

    (dir, repo)
}

#[test]
fn test_commit_diff_parses_into_artifact() {
    let (dir, _repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();

    let diff = git.commit_diff("HEAD").unwrap();
    assert!(diff.contains("diff --git a/src/app.py b/src/app.py"));

    let artifact = parse_diff(&diff, None);
    assert_eq!(artifact.files_changed, vec!["src/app.py"]);
    assert_eq!(artifact.language, Language::Python);
    assert_eq!(artifact.diff_stats.additions, 2);
    assert_eq!(artifact.diff_stats.deletions, 1);
}

#[test]
fn test_root_commit_diff_is_whole_file() {
    let (dir, _repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();

    let diff = git.commit_diff("HEAD~1").unwrap();
    let artifact = parse_diff(&diff, None);

    assert_eq!(artifact.diff_stats.additions, 2);
    assert_eq!(artifact.diff_stats.deletions, 0);
}

#[test]
fn test_range_diff_between_refs() {
    let (dir, repo) = create_repo();
    commit_file(&repo, "lib/util.go", "package lib\n", "Add go helper");
    let git = GitDiff::discover(dir.path()).unwrap();

    let diff = git.diff_for("HEAD", Some("HEAD~2")).unwrap();
    let artifact = parse_diff(&diff, None);

    assert_eq!(artifact.files_changed.len(), 2);
    assert!(artifact.files_changed.contains(&"lib/util.go".to_string()));
    assert!(artifact.files_changed.contains(&"src/app.py".to_string()));
}

#[test]
fn test_staged_diff() {
    let (dir, repo) = create_repo();
    fs::write(dir.path().join("notes.sh"), "echo hi\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("notes.sh")).unwrap();
    index.write().unwrap();

    let git = GitDiff::discover(dir.path()).unwrap();
    let artifact = parse_diff(&git.staged_diff().unwrap(), None);

    assert_eq!(artifact.files_changed, vec!["notes.sh"]);
    assert_eq!(artifact.language, Language::Shell);
}

#[test]
fn test_latin1_lines_are_kept() {
    let (dir, repo) = create_repo();
    commit_file(&repo, "a.py", b"x = 1\ns = '\xe9t\xe9'\ny = 2\n", "Latin-1 source");
    let git = GitDiff::discover(dir.path()).unwrap();

    let diff = git.commit_diff("HEAD").unwrap();
    assert!(diff.contains("+x = 1\n+s = '"));
    assert!(diff.contains("\n+y = 2\n"));

    let artifact = parse_diff(&diff, None);
    assert_eq!(artifact.diff_stats.additions, 3);
    assert_eq!(artifact.diff_stats.deletions, 0);
}

#[test]
fn test_working_diff_tracked_and_untracked() {
    let (dir, _repo) = create_repo();
    fs::write(
        dir.path().join("src/app.py"),
        "def main():\n    print(\"hi\")\n    return 1\n",
    )
    .unwrap();
    fs::write(dir.path().join("extra.rs"), "fn main() {}\n").unwrap();
    let git = GitDiff::discover(dir.path()).unwrap();

    let tracked = parse_diff(&git.working_diff(false).unwrap(), None);
    assert_eq!(tracked.files_changed, vec!["src/app.py"]);
    assert_eq!(tracked.diff_stats.additions, 1);
    assert_eq!(tracked.diff_stats.deletions, 1);

    let all = parse_diff(&git.working_diff(true).unwrap(), None);
    assert_eq!(all.files_changed.len(), 2);
    assert!(all.files_changed.contains(&"extra.rs".to_string()));
}

#[test]
fn test_clean_working_tree_is_empty() {
    let (dir, _repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();
    assert!(git.working_diff(true).unwrap().is_empty());
    assert!(git.staged_diff().unwrap().is_empty());
}

#[test]
fn test_branch_name() {
    let (dir, repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();
    let head = repo.head().unwrap();
    assert_eq!(git.branch_name().as_deref(), head.shorthand());

    // Detached HEAD is not a branch
    let oid = head.target().unwrap();
    repo.set_head_detached(oid).unwrap();
    assert!(git.branch_name().is_none());
}

#[test]
fn test_commit_info() {
    let (dir, _repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();

    let info = git.commit_info("HEAD").unwrap();
    assert_eq!(info.message, "Print a greeting");
    assert_eq!(info.author, "Test Author");
    assert_eq!(info.author_email, "author@example.com");
    assert_eq!(info.sha.len(), 40);
    assert!(!info.timestamp.is_empty());
}

#[test]
fn test_unknown_ref() {
    let (dir, _repo) = create_repo();
    let git = GitDiff::discover(dir.path()).unwrap();

    let err = git.commit_diff("does-not-exist").unwrap_err();
    assert!(matches!(err, GitError::UnknownRef(_)));
}

#[test]
fn test_not_a_repo() {
    let dir = TempDir::new().unwrap();
    let result = GitDiff::discover(dir.path());
    assert!(matches!(result, Err(GitError::NotARepo(_))));
}
