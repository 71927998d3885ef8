pub use super::key_value::Entity as KeyValue;
pub use super::profiles::Entity as Profiles;
pub use super::user_roles::Entity as UserRoles;
