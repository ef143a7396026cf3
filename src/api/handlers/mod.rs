pub mod capture;
pub mod health;
pub mod manual;
pub mod recordings;
pub mod replay;
