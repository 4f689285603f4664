use matchday_signals::config::SimulationConfig;
use matchday_signals::rng::FixedSequence;
use matchday_signals::simulator::MatchSimulator;

const SEED: &str = "A-B-2024-01-01";

fn simulator() -> MatchSimulator {
    MatchSimulator::new(-0.11, &SimulationConfig::default())
}

#[test]
fn strong_home_side_lands_in_expected_ranges() {
    let r = simulator().simulate(1.8, 1.1, 10_000, SEED, 1.0);
    assert!((45..=55).contains(&r.win_home), "home {}", r.win_home);
    assert!((24..=28).contains(&r.draw), "draw {}", r.draw);
    assert!(r.over_15 > 65, "over 1.5 {}", r.over_15);
    assert!(r.over_25 < r.over_15);
    assert_eq!(r.iterations, 10_000);
}

#[test]
fn same_seed_same_result() {
    let sim = simulator();
    let a = sim.simulate(1.8, 1.1, 5_000, SEED, 1.0);
    let b = sim.simulate(1.8, 1.1, 5_000, SEED, 1.0);
    assert_eq!(a, b);

    let c = sim.simulate(1.8, 1.1, 5_000, "C-D-2024-01-01", 1.0);
    assert_eq!(c.iterations, a.iterations);
}

#[test]
fn complementary_markets_add_up() {
    let r = simulator().simulate(1.4, 1.3, 10_000, SEED, 1.2);
    let sum = r.win_home + r.draw + r.win_away;
    assert!((99..=101).contains(&sum), "1X2 sums to {sum}");
    assert!((99..=101).contains(&(r.btts + r.no_goal)));
    assert!(r.win_home.abs_diff(100 - r.dc_x2) <= 1);
    assert!(r.win_away.abs_diff(100 - r.dc_1x) <= 1);
    assert!(r.draw.abs_diff(100 - r.dc_12) <= 1);
}

#[test]
fn injected_sequence_pins_every_match_to_nil_nil() {
    let mut rng = FixedSequence::new(vec![0.1]);
    let r = simulator().simulate_with(1.8, 1.1, 500, 1.0, &mut rng);
    assert_eq!(r.draw, 100);
    assert_eq!(r.win_home, 0);
    assert_eq!(r.over_15, 0);
    assert_eq!(r.btts, 0);
    assert_eq!(r.under_35, 100);
    let modal = r.modal_score.expect("one score observed");
    assert_eq!((modal.home, modal.away), (0, 0));
}
