use chrono::{NaiveTime, TimeDelta};
use proptest::prelude::*;

use lightcycle::config::{TemperatureConfig, TransitionMode};
use lightcycle::cycle::{CycleState, Phase, evaluate};

fn any_mode() -> impl Strategy<Value = TransitionMode> {
    prop_oneof![
        Just(TransitionMode::StartAt),
        Just(TransitionMode::FinishBy),
        Just(TransitionMode::Center),
    ]
}

prop_compose! {
    fn any_config()(
        sunset_mins in (15 * 60u32)..(22 * 60),
        sunrise_mins in (4 * 60u32)..(9 * 60),
        transition in 5u64..=120,
        night in 1000u32..5000,
        span in 100u32..5000,
        mode in any_mode(),
    ) -> TemperatureConfig {
        TemperatureConfig::builder()
            .sunset(NaiveTime::from_num_seconds_from_midnight_opt(sunset_mins * 60, 0).unwrap())
            .sunrise(NaiveTime::from_num_seconds_from_midnight_opt(sunrise_mins * 60, 0).unwrap())
            .transition_minutes(transition)
            .night_temp(night)
            .day_temp(night + span)
            .transition_mode(mode)
            .build()
            .unwrap()
    }
}

fn any_time() -> impl Strategy<Value = NaiveTime> {
    (0u32..86_400).prop_map(|secs| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap())
}

proptest! {
    #[test]
    fn temperature_stays_within_bounds(config in any_config(), time in any_time()) {
        let sample = evaluate(time, &config);
        prop_assert!(sample.temperature >= config.night_temp());
        prop_assert!(sample.temperature <= config.day_temp());
        prop_assert!((0.0..1.0).contains(&sample.position));
    }

    #[test]
    fn state_matches_temperature(config in any_config(), time in any_time()) {
        let sample = evaluate(time, &config);
        prop_assert_eq!(
            sample.state,
            CycleState::classify(sample.temperature, config.night_temp(), config.day_temp())
        );
        prop_assert_ne!(sample.state, CycleState::Disabled);
    }

    #[test]
    fn stable_phases_use_configured_bounds(config in any_config(), time in any_time()) {
        let sample = evaluate(time, &config);
        match config.windows().phase_at(time) {
            Phase::Day => prop_assert_eq!(sample.temperature, config.day_temp()),
            Phase::Night => prop_assert_eq!(sample.temperature, config.night_temp()),
            Phase::Sunset { progress } | Phase::Sunrise { progress } => {
                prop_assert!((0.0..=1.0).contains(&progress));
            }
        }
    }

    #[test]
    fn curve_has_no_jumps(config in any_config(), time in any_time()) {
        let next = time + TimeDelta::seconds(1);
        let a = evaluate(time, &config).temperature;
        let b = evaluate(next, &config).temperature;

        // One second of the steepest possible transition, plus rounding
        let span = f64::from(config.day_temp() - config.night_temp());
        let max_step = (span / config.transition_duration().as_secs_f64()).ceil() as u32 + 1;
        prop_assert!(a.abs_diff(b) <= max_step, "{} -> {} at {}", a, b, time);
    }

    #[test]
    fn sunset_cools_and_sunrise_warms(config in any_config(), time in any_time()) {
        let next = time + TimeDelta::seconds(30);
        let windows = config.windows();
        if let (Phase::Sunset { .. }, Phase::Sunset { .. }) = (windows.phase_at(time), windows.phase_at(next)) {
            prop_assert!(evaluate(next, &config).temperature <= evaluate(time, &config).temperature);
        }
        if let (Phase::Sunrise { .. }, Phase::Sunrise { .. }) = (windows.phase_at(time), windows.phase_at(next)) {
            prop_assert!(evaluate(next, &config).temperature >= evaluate(time, &config).temperature);
        }
    }
}
