//! Query engine: classifies a query line and builds the reply.
//!
//! The engine holds no per-connection state. The host identity is fixed
//! at construction and shared read-only by every connection.

use crate::directory::{Accounts, Directory};
use crate::protocol::{Query, Response};
use crate::uptime::{format_uptime, UptimeSource};
use bytes::BytesMut;
use std::sync::Arc;
use tracing::trace;

pub struct Engine<A, U> {
    identity: Arc<str>,
    directory: Directory<A>,
    uptime: U,
}

impl<A: Accounts, U: UptimeSource> Engine<A, U> {
    pub fn new(identity: Arc<str>, accounts: A, uptime: U) -> Self {
        Engine {
            identity,
            directory: Directory::new(accounts),
            uptime,
        }
    }

    /// Host name shown in the listing banner
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Answer a raw query line
    pub fn respond(&self, line: &str) -> BytesMut {
        let query = Query::parse(line);
        trace!(?query, "Classified query");
        self.dispatch(&query)
    }

    /// Build the reply for a classified query
    pub fn dispatch(&self, query: &Query) -> BytesMut {
        match query {
            Query::Forward => BytesMut::from(Response::forward_denied()),

            // The verbose switch is accepted but does not change the reply
            Query::List { verbose } => {
                trace!(verbose, "Host listing");
                let uptime = format_uptime(self.uptime.uptime_seconds());
                Response::banner(&self.identity, &uptime)
            }

            Query::User { name, verbose } => {
                trace!(user = %name, verbose, "User lookup");
                match self.directory.lookup(name) {
                    Some(entity) => Response::user(name, &entity.display_name, &entity.plan),
                    None => Response::no_such_user(name),
                }
            }

            Query::Malformed => BytesMut::from(Response::empty()),
        }
    }
}
