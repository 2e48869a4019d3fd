//! Domain Layer
//!
//! Contains all domain entities and core abstractions.
//! This layer has no I/O (serde and chrono only).

mod entity;
mod board;
mod list;
mod card;
mod comment;
mod session;
pub mod validation;

pub use entity::{decode_row, decode_rows, encode_row, DomainError, DomainResult, Entity, Row, Table};
pub use board::{Board, BoardPatch, NewBoard};
pub use list::{List, ListPatch, NewList};
pub use card::{Card, CardPatch, NewCard};
pub use comment::{Comment, NewComment};
pub use session::{Session, User};
