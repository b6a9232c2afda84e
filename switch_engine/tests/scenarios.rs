use switch_engine as se;

use se::condition::RawCondition;
use se::*;
use switch_data::{CommandDef, EventDef, MapDef, PageDef, TriggerKind};

fn door() -> SwitchKey {
    SwitchKey::new(1, 5, "DOOR")
}

fn page(comments: &[&str]) -> Option<PageDef> {
    Some(PageDef {
        list: Some(comments.iter().map(|c| CommandDef::comment(*c)).collect()),
        ..PageDef::default()
    })
}

fn door_map(pages: Vec<Option<PageDef>>) -> MapDef {
    MapDef {
        id: 1,
        name: "Town".into(),
        events: vec![EventDef {
            id: 5,
            name: "Door".into(),
            pages,
        }],
    }
}

struct World {
    store: SwitchStore,
    conditions: ConditionRegistry,
    state: GameVariables,
    evaluator: ConditionEvaluator,
}

impl World {
    fn new() -> Self {
        Self {
            store: SwitchStore::new(),
            conditions: ConditionRegistry::new(),
            state: GameVariables::new(),
            evaluator: ConditionEvaluator::default(),
        }
    }

    fn pass(&mut self, now: i64) -> PassReport {
        self.evaluator
            .evaluate(now, &mut self.store, &mut self.conditions, &self.state)
    }
}

#[test]
fn satisfied_persistent_condition_notifies_once() {
    let mut world = World::new();
    world.state.set_item_quantity(7, 3);
    world
        .conditions
        .add(door(), Condition::inventory(7, QuantityOp::AtLeast, 2, true));

    let notices: usize = (0..2).map(|t| world.pass(t).notices.len()).sum();
    assert_eq!(notices, 1);
    assert_eq!(world.conditions.len(), 1);
    assert!(world.store.is_on(&door()));
}

#[test]
fn timer_fires_exactly_at_deadline() {
    const T0: i64 = 1_000;
    const D: i64 = 60;
    let mut world = World::new();
    world.conditions.add(door(), Condition::timer(T0, D, true));

    let early = world.pass(T0 + D - 1);
    assert!(early.notices.is_empty());
    assert!(!world.store.is_on(&door()));
    assert_eq!(world.conditions.len(), 1);

    let due = world.pass(T0 + D);
    assert_eq!(due.notices.len(), 1);
    assert_eq!(world.store.get(&door()), SwitchState::On);
    assert!(world.conditions.is_empty());

    let after = world.pass(T0 + D + 1);
    assert_eq!(after, PassReport { at: T0 + D + 1, ..PassReport::default() });
}

#[test]
fn corrupt_record_is_skipped_then_cleaned() {
    let mut world = World::new();
    let lamp = door().renamed("LAMP");
    world
        .conditions
        .add(lamp.clone(), Condition::variable(1, CompareOp::Ne, 0, true));
    world.conditions.insert_raw(
        ConditionKey::new(ConditionKind::Variable, door()),
        RawCondition {
            kind: Some(ConditionKind::Variable),
            var_id: Some(1),
            comparison: Some(CompareOp::Eq),
            value: Some(0),
            ..RawCondition::default()
        },
    );

    let report = world.pass(10);
    assert_eq!(report.skipped_corrupt, 1);
    assert_eq!(report.evaluated, 1);
    assert!(world.store.get(&door()).is_unset());

    assert_eq!(world.conditions.cleanup_invalid(10, 3600, 10), 1);
    assert_eq!(world.conditions.len(), 1);
    assert_eq!(world.conditions.for_switch(&lamp).count(), 1);
}

#[test]
fn later_declared_satisfied_page_wins_over_specific_one() {
    // page 0 needs DOOR on, page 1 has no switch gate and is declared later
    let def = door_map(vec![page(&["Switch: DOOR: on"]), page(&[])]);
    let mut store = SwitchStore::new();
    let state = GameVariables::new();
    let mut map = GameMap::from_def(&def);

    store.set(&door(), true).expect("set");
    map.refresh(&mut store, &state);
    assert_eq!(map.event(5).and_then(|e| e.current_page()), Some(1));

    let event = map.event(5).expect("event");
    let resolution = PageResolver::new(&store, &state).resolve(1, 5, event.pages(), event.current_page());
    assert_eq!(resolution, Resolution { page: Some(1), changed: false });
}

#[test]
fn specific_page_declared_last_follows_the_switch() {
    let def = door_map(vec![page(&[]), page(&["Switch: DOOR: on"])]);
    let mut store = SwitchStore::new();
    let state = GameVariables::new();
    let mut map = GameMap::from_def(&def);

    map.refresh(&mut store, &state);
    assert_eq!(map.event(5).and_then(|e| e.current_page()), Some(0));

    store.set(&door(), true).expect("set");
    map.refresh(&mut store, &state);
    assert_eq!(map.event(5).and_then(|e| e.current_page()), Some(1));
}

#[test]
fn tick_applies_conditions_before_refreshing_pages() {
    let mut autorun = page(&["SelfSwitch: DOOR"]);
    if let Some(def) = autorun.as_mut() {
        def.trigger = TriggerKind::Autorun;
    }
    let def = door_map(vec![page(&[]), autorun]);
    let mut engine = SwitchEngine::default();
    let mut state = GameVariables::new();
    engine.scan([&def]);
    let mut map = engine.load_map(&def);
    engine
        .add_condition(door(), Condition::variable(4, CompareOp::Ge, 100, true))
        .expect("condition");

    let first = engine.tick(0, &state, Some(&mut map));
    assert_eq!(first.refresh.map(|r| r.changed), Some(vec![(5, Some(0))]));

    state.set_variable(4, 100);
    // throttled: nothing evaluated, nothing refreshed
    let throttled = engine.tick(0, &state, Some(&mut map));
    assert_eq!(throttled, TickReport::default());

    let fired = engine.tick(1, &state, Some(&mut map));
    assert_eq!(fired.messages, vec!["Switch 'DOOR' is now ON (variable condition)".to_string()]);
    let refresh = fired.refresh.expect("map refreshed in the same tick");
    assert_eq!(refresh.changed, vec![(5, Some(1))]);
    assert_eq!(refresh.autoruns, vec![5]);

    let quiet = engine.tick(2, &state, Some(&mut map));
    assert!(quiet.messages.is_empty());
    assert!(quiet.refresh.is_none());
    assert_eq!(map.event(5).map(|e| e.setup_count()), Some(2));
}

#[test]
fn external_clients_can_request_a_refresh() {
    let def = door_map(vec![page(&[]), page(&["SelfSwitch: DOOR"])]);
    let mut engine = SwitchEngine::default();
    let state = GameVariables::new();
    let mut map = engine.load_map(&def);
    engine.tick(0, &state, Some(&mut map));

    engine.store_mut().set(&door(), true).expect("set");
    engine.store_mut().drain_dirty();
    engine.notify_map_changed(1);
    let report = engine.tick(0, &state, Some(&mut map));
    assert_eq!(report.refresh.map(|r| r.changed), Some(vec![(5, Some(1))]));
}

#[test]
fn snapshot_survives_a_save_cycle() {
    let def = door_map(vec![page(&["Switch: DOOR: on"])]);
    let mut engine = SwitchEngine::default();
    engine.scan([&def]);
    engine.set(&door(), true).expect("set");
    engine
        .add_condition(door(), Condition::timer(100, 30, false))
        .expect("condition");
    let text = engine.snapshot().to_ron().expect("serialize");

    let mut restored = SwitchEngine::default();
    let report = restored.restore(&SwitchSnapshot::from_ron(&text));
    assert_eq!(report.skipped, 0);
    assert_eq!(restored.get(&door()), SwitchState::On);
    assert!(restored.registry().contains(1, "DOOR"));

    // the persisted start time keeps the deadline absolute
    let state = GameVariables::new();
    let report = restored.tick(130, &state, None);
    assert_eq!(report.pass.map(|p| p.notices.len()), Some(1));
    assert_eq!(restored.get(&door()), SwitchState::Off);
}

#[test]
fn damaged_save_data_never_aborts_the_tick_loop() {
    let timer = |start: i64, seconds: i64| RawCondition {
        kind: Some(ConditionKind::Timer),
        new_state: Some(true),
        start_time: Some(start),
        seconds: Some(seconds),
        ..RawCondition::default()
    };
    let mut snapshot = SwitchSnapshot::default();
    snapshot.conditions.insert("timer:1:5:DOOR".into(), timer(i64::MIN, 5));
    snapshot.conditions.insert("timer:1:5:LAMP".into(), timer(0, i64::MAX));
    snapshot.conditions.insert("gameswitch:1:5:A".into(), RawCondition::default());

    let mut engine = SwitchEngine::default();
    let report = engine.restore(&snapshot);
    assert_eq!(report.conditions, 2);
    assert_eq!(report.skipped, 1);

    assert_eq!(engine.cleanup_invalid(10), 1);
    let state = GameVariables::new();
    let tick = engine.tick(10, &state, None);
    assert_eq!(tick.pass.map(|p| p.expired), Some(0));
    assert!(engine.get(&door()).is_unset());
    assert_eq!(engine.conditions().len(), 1);
    assert_eq!(engine.cleanup_invalid(i64::MAX), 0);
}

#[test]
fn manual_clock_drives_engine_ticks() {
    let clock = ManualClock::new(500);
    let mut engine = SwitchEngine::default();
    let state = GameVariables::new();
    engine
        .add_condition(door(), Condition::timer(clock.now(), 5, true))
        .expect("condition");
    for _ in 0..4 {
        clock.advance(1);
        engine.tick(clock.now(), &state, None);
    }
    assert!(engine.get(&door()).is_unset());
    clock.advance(1);
    engine.tick(clock.now(), &state, None);
    assert!(engine.store().is_on(&door()));
}
