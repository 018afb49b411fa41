//! External delivery channels for update notifications.

pub mod webhook;
