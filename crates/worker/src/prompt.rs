//! The fixed instruction template handed to the agent per work item.

use pipeline::WorkItem;

/// Builds the natural-language prompt for one work item: who asked, what they
/// asked for, and the multi-step plan the agent is expected to follow.
pub fn build_prompt(item: &WorkItem) -> String {
    format!(
        "A user @{user} has requested help with issue #{issue} in repository {repo}.\n\
         \n\
         Command: {command}\n\
         \n\
         Please help by:\n\
         1. Getting the issue details to understand what's needed\n\
         2. Analyzing the repository structure\n\
         3. Creating a branch for the work\n\
         4. Making the necessary changes\n\
         5. Creating a pull request\n\
         6. Summarizing what you did\n\
         \n\
         Repository: {repo}\n\
         Issue: #{issue}\n",
        user = item.user,
        issue = item.issue_number,
        repo = item.repository,
        command = item.command,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{IssueNumber, RepositoryId};

    #[test]
    fn prompt_embeds_every_work_item_field() {
        let item = WorkItem::new(
            RepositoryId::new("octocat/hello-world").unwrap(),
            IssueNumber::new(17),
            "/agent add a login button",
            Some("octocat".to_string()),
            None,
        )
        .unwrap();

        let prompt = build_prompt(&item);
        assert!(prompt.contains("@octocat"));
        assert!(prompt.contains("issue #17"));
        assert!(prompt.contains("octocat/hello-world"));
        assert!(prompt.contains("Command: /agent add a login button"));
        assert!(prompt.contains("5. Creating a pull request"));
    }
}
