use std::cell::RefCell;
use std::rc::Rc;

use vista_core::{ComponentDefinition, InstancePhase, StateListener};
use vista_testing::prelude::*;

fn producer(total: &SharedState<i32>) -> Rc<dyn ComponentDefinition> {
    Component::new(0i32, |_cx, n: &i32| h("button").text(n).build())
        .on_local("add", |n, _event, _| Rc::new(**n + 1))
        .derive(total.clone(), |old, new| new > old, |n| *n)
        .into_definition()
}

fn consumer(total: &SharedState<i32>) -> Rc<dyn ComponentDefinition> {
    Component::with_shared((total.clone(),), (), |_cx, _state: &(), (total,)| {
        h("output").text(total).build()
    })
    .into_definition()
}

#[test]
fn derived_write_redraws_subscribers_in_the_same_turn() {
    run_test_runtime(|rule| {
        let total = SharedState::new(0);
        rule.register([("producer", producer(&total)), ("consumer", consumer(&total))]);
        rule.mount("producer").expect("producer");
        let reader = rule.mount("consumer").expect("consumer");

        rule.dispatch("producer", "add");
        assert_eq!(total.read(), 1);
        assert_eq!(reader.phase(), InstancePhase::RedrawScheduled);

        assert_eq!(rule.pump_until_idle(), 1);
        assert_eq!(rule.text("producer").as_deref(), Some("1"));
        assert_eq!(rule.text("consumer").as_deref(), Some("1"));
        assert_eq!(reader.stats().redraws, 1);
    });
}

#[test]
fn derive_rule_predicate_gates_the_write() {
    run_test_runtime(|rule| {
        let total = SharedState::new(0);
        let down = Component::new(10i32, |_cx, n: &i32| h("span").text(n).build())
            .on_local("dec", |n, _event, _| Rc::new(**n - 1))
            .derive(total.clone(), |old, new| new > old, |n| *n)
            .into_definition();
        rule.register([("down", down)]);
        rule.mount("down").expect("mount");

        let writes = Rc::new(RefCell::new(Vec::new()));
        let probe: StateListener = {
            let writes = Rc::clone(&writes);
            let total = total.clone();
            Rc::new(move || writes.borrow_mut().push(total.read()))
        };
        total.subscribe(&probe);

        rule.dispatch("down", "dec");
        rule.pump_until_idle();
        assert!(writes.borrow().is_empty());
        assert_eq!(rule.text("down").as_deref(), Some("9"));
    });
}

#[test]
fn external_write_redraws_even_without_own_state_change() {
    run_test_runtime(|rule| {
        let total = SharedState::new(5);
        rule.register([("consumer", consumer(&total))]);
        let reader = rule.mount("consumer").expect("consumer");
        assert_eq!(rule.text("consumer").as_deref(), Some("5"));

        total.write(6);
        total.write(7);
        assert_eq!(rule.turn_requests(), 1);
        rule.pump_until_idle();
        assert_eq!(rule.text("consumer").as_deref(), Some("7"));
        assert_eq!(reader.stats().renders, 1);

        total.write(7);
        rule.pump_until_idle();
        assert_eq!(reader.stats().renders, 2);
        assert_eq!(reader.stats().redraws, 1);
    });
}

#[test]
fn child_emits_to_parent_through_its_root() {
    run_test_runtime(|rule| {
        let child = Component::new(0u32, |_cx, n: &u32| h("button").text(n).build())
            .on_local("click", |n, _event, _| Rc::new(**n + 1))
            .emit(
                EmitTarget::Root,
                |_old, new| new % 2 == 0,
                |_old, new| Event::new("even").with_detail(*new),
            )
            .into_definition();
        let parent = Component::new(None::<u32>, |_cx, last: &Option<u32>| {
            let label = last.map_or_else(|| String::from("none"), |n| n.to_string());
            h("div").child(h("p").text(label)).child(viewport("child")).build()
        })
        .on_local("even", |_last, event, _| Rc::new(event.detail::<u32>().copied()))
        .into_definition();
        rule.register([("parent", parent), ("child", child)]);
        let parent_instance = rule.mount("parent").expect("mount");

        rule.dispatch("child", "click");
        rule.pump_until_idle();
        assert_eq!(parent_instance.stats().redraws, 0);

        rule.dispatch("child", "click");
        rule.pump_until_idle();
        let last = parent_instance
            .state()
            .downcast::<Option<u32>>()
            .expect("parent state");
        assert_eq!(*last, Some(2));
        assert_eq!(rule.text("parent").as_deref(), Some("22"));
    });
}

#[test]
fn window_emission_reaches_global_listeners() {
    run_test_runtime(|rule| {
        let source = Component::new(false, |_cx, on: &bool| h("i").text(on).build())
            .on_local("flip", |on, _event, _| Rc::new(!**on))
            .emit(
                EmitTarget::Window,
                |old, new| old != new,
                |_old, new| Event::new("flipped").with_detail(*new),
            )
            .into_definition();
        let sink = Component::new(0u8, |_cx, seen: &u8| h("em").text(seen).build())
            .on_window("flipped", |seen, _event, _| Rc::new(**seen + 1))
            .into_definition();
        rule.register([("source", source), ("sink", sink)]);
        rule.mount("source").expect("source");
        rule.mount("sink").expect("sink");

        rule.dispatch("source", "flip");
        rule.dispatch("source", "flip");
        rule.pump_until_idle();
        assert_eq!(rule.text("sink").as_deref(), Some("2"));
        assert_eq!(rule.text("source").as_deref(), Some("false"));
    });
}
