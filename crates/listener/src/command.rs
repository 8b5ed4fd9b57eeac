//! Slash-command extraction from comment bodies.

/// The literal prefix that marks a line as an agent command.
pub const COMMAND_PREFIX: &str = "/agent";

/// Returns the first line of `body` (trimmed) that starts with
/// [`COMMAND_PREFIX`], or `None` when the comment carries no command.
pub fn parse_command(body: &str) -> Option<String> {
    body.lines()
        .map(str::trim)
        .find(|line| line.starts_with(COMMAND_PREFIX))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_first_command_line() {
        let body = "/agent fix the bug\nthanks";
        assert_eq!(parse_command(body).as_deref(), Some("/agent fix the bug"));
    }

    #[test]
    fn skips_leading_chatter_and_blank_lines() {
        let body = "\n\nhey bot,\n   /agent add a login button   \nappreciated!";
        assert_eq!(
            parse_command(body).as_deref(),
            Some("/agent add a login button")
        );
    }

    #[test]
    fn first_of_several_commands_wins() {
        let body = "/agent do this\n/agent not this";
        assert_eq!(parse_command(body).as_deref(), Some("/agent do this"));
    }

    #[test]
    fn no_command_yields_none() {
        assert_eq!(parse_command("just a regular comment"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("\n\n\n"), None);
    }

    #[test]
    fn command_must_start_the_line() {
        assert_eq!(parse_command("please run /agent fix it"), None);
    }
}
