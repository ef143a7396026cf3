pub mod recording;
pub mod replay;
pub mod requests;
pub mod responses;

pub use recording::*;
pub use replay::*;
pub use requests::*;
pub use responses::*;
