//! Cat consultation chat client.
//!
//! DESIGN
//! ======
//! Layered bottom-up: [`transport`] bounds every HTTP exchange with a
//! deadline; [`imaging`] validates and encodes attachments;
//! [`consultation`] builds requests and folds every failure into one
//! [`consultation::ConsultError`]; [`conversation`] owns the message log and
//! the single in-flight flag; [`session`] drives one round trip across all
//! of them. Configuration is explicit ([`config::ClientConfig`]) and read
//! from the environment only by the binary.

pub mod config;
pub mod consultation;
pub mod conversation;
pub mod error;
pub mod imaging;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_helpers;
