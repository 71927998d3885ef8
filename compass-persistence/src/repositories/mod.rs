pub mod key_value_repository;
pub mod profile_repository;
pub mod role_repository;

pub use key_value_repository::KeyValueRepository;
pub use profile_repository::ProfileRepository;
pub use role_repository::RoleRepository;
