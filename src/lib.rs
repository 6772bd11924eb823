pub mod db;
pub mod server;
pub mod terminal;
pub mod version;
pub mod web;

#[cfg(test)]
pub(crate) mod test_support;
