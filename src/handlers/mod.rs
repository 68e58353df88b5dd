mod health_check;
mod pop;
mod push;
mod wire;

pub use health_check::health_check;
pub use pop::pop;
pub use push::push;
pub use wire::PushRequestBody;
