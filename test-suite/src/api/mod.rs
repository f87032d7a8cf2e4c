pub mod client;
pub mod server;

#[cfg(test)]
mod test_find_max;
