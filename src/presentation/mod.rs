pub(crate) mod terminal;
pub(crate) mod web;
