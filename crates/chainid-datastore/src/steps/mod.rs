//! The released migration plan.
//!
//! Each step is frozen once released: it reads and writes records through
//! its own local structs, never through the current types in
//! [`crate::records`], so later schema changes cannot alter what an old
//! step does.

use chainid_migrate::{MigrationError, MigrationPlan};

mod endpoints;
mod resource_controls;
mod settings;
mod users;

/// Schema version written by this release.
pub const DB_VERSION: u32 = 11;

/// Every step from an empty store up to [`DB_VERSION`].
pub fn plan() -> Result<MigrationPlan, MigrationError> {
    MigrationPlan::builder()
        .boxed(users::register_admin_user_to_id_keys())
        .boxed(resource_controls::register_resource_controls_and_endpoint_access())
        .boxed(settings::register_settings_defaults())
        .boxed(endpoints::register_endpoint_tls_config())
        .boxed(settings::register_settings_bind_mounts())
        .boxed(settings::register_settings_privileged_mode())
        .boxed(settings::register_settings_donation_header())
        .boxed(endpoints::register_endpoint_extensions())
        .boxed(endpoints::register_endpoint_groups())
        .boxed(endpoints::register_endpoint_types())
        .boxed(endpoints::register_endpoint_local_tls())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainid_migrate::MigrationStep;

    #[test]
    fn plan_covers_every_version() {
        let plan = plan().unwrap();
        assert_eq!(plan.latest_version(), DB_VERSION);
        assert!(plan.validate_chain(0).is_ok());
        assert_eq!(plan.len(), DB_VERSION as usize);
    }

    #[test]
    fn step_names_are_unique() {
        let plan = plan().unwrap();
        let mut names: Vec<&str> = plan.steps().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), plan.len());
    }
}
