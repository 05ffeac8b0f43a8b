//! Transport abstraction for the messaging platform.
//!
//! The sync engines never talk to the wire directly. A platform binding
//! implements [`Transport`] (history iteration, send/edit/delete, a
//! distinguishable rate-limit signal) and [`FileStager`] (download to a
//! temporary location, cleanup), and feeds live updates through a
//! [`ChatEvent`] channel.

pub mod error;
pub mod staging;
pub mod transport;

pub use {
    error::{Error, Result},
    staging::FileStager,
    transport::{ChatEvent, FileKind, HistoryOrder, HistoryStream, OutgoingPost, RawMessage, Transport},
};
