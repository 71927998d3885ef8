pub mod prelude;

pub mod key_value;
pub mod profiles;
pub mod user_roles;
