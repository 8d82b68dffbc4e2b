//! Finger query parser and response generator.
//!
//! A finger query is a single line sent by the client. It takes one of
//! three shapes:
//! - empty, or the verbose switch `/W` alone: list the host
//! - `[/W ]username`: describe one user
//! - anything containing `@`: forward to another host (always denied)
//!
//! Every other line is malformed and gets an empty reply.

use bytes::BytesMut;

/// Line terminator for every reply line
pub const CRLF: &[u8] = b"\r\n";

/// Parsed finger query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// `user@host` style request to relay the query elsewhere
    Forward,

    /// Host listing
    List { verbose: bool },

    /// Information about a single user
    User { name: String, verbose: bool },

    /// Line that matches none of the query shapes
    Malformed,
}

impl Query {
    /// Classify a query line (already stripped of its terminator).
    ///
    /// The forwarding marker is checked first, so any line with an `@` is
    /// denied even when the rest of it would not parse.
    pub fn parse(line: &str) -> Query {
        if line.contains('@') {
            return Query::Forward;
        }

        let trimmed = line.trim_matches(is_blank);
        if trimmed.is_empty() {
            return Query::List { verbose: false };
        }

        let after_switch = strip_verbose_switch(trimmed);
        if after_switch == Some("") {
            return Query::List { verbose: true };
        }

        // The switch must be separated from the name by at least one blank.
        let (verbose, name) = match after_switch {
            Some(rest) if rest.starts_with(is_blank) => (true, rest.trim_start_matches(is_blank)),
            _ => (false, trimmed),
        };

        if is_valid_name(name) {
            Query::User {
                name: name.to_string(),
                verbose,
            }
        } else {
            Query::Malformed
        }
    }
}

/// Strip a leading `/W` or `/w`, returning what follows it.
fn strip_verbose_switch(s: &str) -> Option<&str> {
    s.strip_prefix("/W").or_else(|| s.strip_prefix("/w"))
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Characters accepted in a user name
pub fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '!' | '(' | ')' | '_' | '-' | '.' | '?' | '[' | ']' | '`' | '~')
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_name_char)
}

/// Response generator for the finger protocol
pub struct Response;

impl Response {
    /// Reply to a forwarding request
    pub fn forward_denied() -> &'static [u8] {
        b"Finger forwarding service denied\r\n"
    }

    /// Reply to a malformed query: a bare terminator
    pub fn empty() -> &'static [u8] {
        CRLF
    }

    /// Host banner with uptime
    pub fn banner(identity: &str, uptime: &str) -> BytesMut {
        let mut response = BytesMut::with_capacity(24 + identity.len() + uptime.len());
        response.extend_from_slice(b"Welcome to ");
        response.extend_from_slice(identity.as_bytes());
        response.extend_from_slice(b"!\r\n");
        response.extend_from_slice(b"Uptime: ");
        response.extend_from_slice(uptime.as_bytes());
        response.extend_from_slice(CRLF);
        response
    }

    /// Description of an existing user.
    ///
    /// The plan text is copied verbatim and is the last thing in the reply;
    /// any trailing terminator comes from the plan itself.
    pub fn user(name: &str, display_name: &str, plan: &[u8]) -> BytesMut {
        let mut response =
            BytesMut::with_capacity(22 + name.len() + display_name.len() + plan.len());
        response.extend_from_slice(b"User: ");
        response.extend_from_slice(name.as_bytes());
        response.extend_from_slice(CRLF);
        response.extend_from_slice(b"Name: ");
        response.extend_from_slice(display_name.as_bytes());
        response.extend_from_slice(CRLF);
        response.extend_from_slice(b"Plan: ");
        response.extend_from_slice(plan);
        response
    }

    /// Reply for an unknown user
    pub fn no_such_user(name: &str) -> BytesMut {
        let mut response = BytesMut::with_capacity(name.len() + 16);
        response.extend_from_slice(name.as_bytes());
        response.extend_from_slice(b": no such user\r\n");
        response
    }
}
