//! API request handlers

pub(crate) mod info;
pub(crate) mod preparation;
