//! Property tests for permission toggles and their audit history.

use chrono::{TimeZone, Utc};
use condor_core::{
    FeatureKey, PermissionMap, Profile, TenantId, TenantSettings, UserId,
    PERMISSION_HISTORY_LIMIT,
};
use proptest::prelude::*;

fn arb_toggle() -> impl Strategy<Value = (Profile, String, bool)> {
    (
        prop::sample::select(Profile::ALL.to_vec()),
        prop::sample::select(vec!["reservas", "encomendas", "marketplace", "chamados_portaria"]),
        any::<bool>(),
    )
        .prop_map(|(profile, feature, enabled)| (profile, feature.to_string(), enabled))
}

proptest! {
    #[test]
    fn prop_history_is_capped_and_version_counts_toggles(
        toggles in prop::collection::vec(arb_toggle(), 0..250),
    ) {
        let mut settings = TenantSettings::new(TenantId::new("cond-a"));
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for (profile, feature, enabled) in &toggles {
            settings.apply_toggle(
                UserId::new("admin"),
                *profile,
                FeatureKey::new(feature.as_str()),
                *enabled,
                at,
            );
        }

        prop_assert_eq!(settings.permissions_version, toggles.len() as u64);
        prop_assert_eq!(
            settings.permission_history.len(),
            toggles.len().min(PERMISSION_HISTORY_LIMIT)
        );
        if let (Some(last), Some(entry)) = (toggles.last(), settings.permission_history.last()) {
            prop_assert_eq!(entry.feature.as_str(), last.1.as_str());
        }
    }

    #[test]
    fn prop_last_toggle_wins_per_pair(toggles in prop::collection::vec(arb_toggle(), 1..60)) {
        let mut map = PermissionMap::new();
        for (profile, feature, enabled) in &toggles {
            map.set(*profile, FeatureKey::new(feature.as_str()), *enabled);
        }
        for profile in Profile::ALL {
            for feature in ["reservas", "encomendas", "marketplace", "chamados_portaria"] {
                let expected = toggles
                    .iter()
                    .rev()
                    .find(|(p, f, _)| *p == profile && f == feature)
                    .map(|(_, _, enabled)| *enabled)
                    .unwrap_or(true);
                prop_assert_eq!(map.is_enabled(profile, &FeatureKey::new(feature)), expected);
            }
        }
    }
}
