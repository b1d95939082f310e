pub mod behavioral;
pub mod context;
pub mod driver;
pub mod fingerprint;
pub mod page;
pub mod session;
pub mod stealth;
