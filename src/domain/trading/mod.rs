// Virtual portfolio and the session that funds it
pub mod portfolio;
pub mod session;
