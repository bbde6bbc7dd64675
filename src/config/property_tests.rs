//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! validation bounds and serialization round-trips.

use super::*;
use proptest::prelude::*;

prop_compose! {
    fn valid_keymap_names()(
        model in prop_oneof![Just("pc104".to_string()), Just("pc105".to_string())],
        layout in prop_oneof![
            Just("us".to_string()),
            Just("de".to_string()),
            Just("fr".to_string()),
            Just("us,ru".to_string()),
        ],
        variant in prop_oneof![Just(String::new()), Just("dvorak".to_string())],
        options in prop::option::of(prop_oneof![
            Just("caps:escape".to_string()),
            Just("grp:alt_shift_toggle".to_string()),
        ]),
    ) -> KeymapNames {
        KeymapNames {
            rules: "evdev".to_string(),
            model,
            layout,
            variant,
            options,
        }
    }
}

prop_compose! {
    fn valid_keyboard_config()(
        repeat_rate in 0i32..=1000,
        repeat_delay in 1i32..=10_000,
        use_keymap_engine in any::<bool>(),
        xkb in valid_keymap_names(),
    ) -> KeyboardConfig {
        KeyboardConfig {
            repeat_rate,
            repeat_delay,
            use_keymap_engine,
            xkb,
        }
    }
}

prop_compose! {
    fn valid_seat_config()(
        name in "[a-z][a-z0-9-]{0,15}",
        keyboard in valid_keyboard_config(),
        initial_x in -10_000.0f64..10_000.0,
        initial_y in -10_000.0f64..10_000.0,
    ) -> SeatConfig {
        SeatConfig {
            seat: SeatSection { name },
            keyboard,
            pointer: PointerConfig { initial_x, initial_y },
        }
    }
}

proptest! {
    /// Test that all generated configurations pass validation
    #[test]
    fn test_valid_configs_validate(config in valid_seat_config()) {
        prop_assert!(config.validate().is_ok());
    }

    /// Test TOML serialization round-trip preserves data
    #[test]
    fn test_config_toml_roundtrip(config in valid_seat_config()) {
        let toml_str = toml::to_string(&config)?;
        let parsed = SeatConfig::from_toml_str(&toml_str)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;

        prop_assert_eq!(&config.seat, &parsed.seat);
        prop_assert_eq!(&config.keyboard, &parsed.keyboard);
        prop_assert!((config.pointer.initial_x - parsed.pointer.initial_x).abs() < 1e-9);
        prop_assert!((config.pointer.initial_y - parsed.pointer.initial_y).abs() < 1e-9);
    }

    /// Test that out-of-range repeat rates are rejected
    #[test]
    fn test_repeat_rate_bounds(rate in prop_oneof![i32::MIN..0, 1001i32..i32::MAX]) {
        let mut config = SeatConfig::default();
        config.keyboard.repeat_rate = rate;
        prop_assert!(config.validate().is_err());
    }

    /// Test that out-of-range repeat delays are rejected
    #[test]
    fn test_repeat_delay_bounds(delay in prop_oneof![i32::MIN..1, 10_001i32..i32::MAX]) {
        let mut config = SeatConfig::default();
        config.keyboard.repeat_delay = delay;
        prop_assert!(config.validate().is_err());
    }

    /// Test that arbitrary input never panics the parser
    #[test]
    fn test_arbitrary_toml_never_panics(text in "\\PC{0,200}") {
        let _ = SeatConfig::from_toml_str(&text);
    }
}
