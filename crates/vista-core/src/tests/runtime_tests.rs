use super::*;
use crate::component::{Component, EventScope};
use crate::instance::InstancePhase;
use crate::viewport::viewport;
use std::cell::Cell;
use vista_dom::{h, Event};

thread_local! {
    static COUNTER_RENDERS: Cell<usize> = const { Cell::new(0) };
}

fn runtime() -> (Runtime, Arc<TestScheduler>) {
    let scheduler = Arc::new(TestScheduler::default());
    let runtime = Runtime::new(scheduler.clone());
    (runtime, scheduler)
}

fn counter() -> Rc<dyn ComponentDefinition> {
    Component::new(0i32, |_cx, count: &i32| {
        COUNTER_RENDERS.with(|renders| renders.set(renders.get() + 1));
        h("span").text(count).build()
    })
    .on_local("click", |count, _event, _| Rc::new(**count + 1))
    .tag("counter")
    .into_definition()
}

fn mount_at(runtime: &Runtime, id: &str) -> (Node, Rc<dyn MountedInstance>) {
    let mount = viewport(id);
    runtime.document().body().append_child(&mount);
    let instance = runtime.mount(&mount).expect("mount");
    (mount, instance)
}

#[test]
fn spawned_tasks_wait_for_the_next_turn() {
    let (runtime, scheduler) = runtime();
    let ran = Rc::new(Cell::new(0));
    let inner_ran = Rc::clone(&ran);
    let handle = runtime.handle();
    runtime.spawn_task(Box::new(move || {
        inner_ran.set(inner_ran.get() + 1);
        let again = Rc::clone(&inner_ran);
        handle.spawn_task(Box::new(move || again.set(again.get() + 10)));
    }));
    assert_eq!(scheduler.requests(), 1);
    assert_eq!(ran.get(), 0);

    assert_eq!(runtime.run_turn(), 1);
    assert_eq!(ran.get(), 1);
    assert!(runtime.has_pending_tasks());

    assert_eq!(runtime.run_until_idle(), 1);
    assert_eq!(ran.get(), 11);
    assert_eq!(runtime.turns(), 2);
}

#[test]
fn handle_is_inert_after_runtime_drop() {
    let (runtime, scheduler) = runtime();
    let handle = runtime.handle();
    drop(runtime);
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    handle.spawn_task(Box::new(move || flag.set(true)));
    assert!(!handle.is_alive());
    assert!(!handle.has_pending_tasks());
    assert!(!ran.get());
    assert_eq!(scheduler.requests(), 0);
}

#[test]
fn click_redraws_once_after_the_turn() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    let (mount, instance) = mount_at(&runtime, "a");
    let button = instance.root();
    assert_eq!(mount.text_content(), "0");

    button.dispatch_event(&Event::new("click"));
    assert_eq!(mount.text_content(), "0");
    assert_eq!(instance.phase(), InstancePhase::RedrawScheduled);

    runtime.run_until_idle();
    assert_eq!(mount.text_content(), "1");
    assert_eq!(instance.stats().redraws, 1);
    assert_eq!(instance.phase(), InstancePhase::Idle);
    assert!(instance.root().ptr_eq(&button));
}

#[test]
fn back_to_back_clicks_are_batched() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    let (mount, instance) = mount_at(&runtime, "a");
    let root = instance.root();
    let before = COUNTER_RENDERS.with(Cell::get);

    root.dispatch_event(&Event::new("click"));
    root.dispatch_event(&Event::new("click"));
    assert_eq!(runtime.run_until_idle(), 1);

    assert_eq!(mount.text_content(), "2");
    assert_eq!(instance.stats().renders, 1);
    assert_eq!(COUNTER_RENDERS.with(Cell::get) - before, 1);
}

#[test]
fn mount_errors_are_reported() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);

    let anonymous = h("div").class("viewport").build();
    assert_eq!(
        runtime.mount(&anonymous).err(),
        Some(RuntimeError::MissingViewportId)
    );

    let unknown = viewport("nope");
    assert_eq!(
        runtime.mount(&unknown).err(),
        Some(RuntimeError::UnknownComponent { id: "nope".into() })
    );

    let (_mount, _instance) = mount_at(&runtime, "a");
    let twin = viewport("a");
    assert_eq!(
        runtime.mount(&twin).err(),
        Some(RuntimeError::DuplicateMountPoint { id: "a".into() })
    );
    assert!(!twin.has_child_nodes());
    assert_eq!(runtime.mounted_ids(), ["a"]);
}

#[test]
fn missing_handler_is_an_error_through_handle_event() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    let (_mount, instance) = mount_at(&runtime, "a");
    let err = instance
        .handle_event(EventScope::Window, &Event::new("resize"))
        .unwrap_err();
    assert_eq!(
        err,
        RuntimeError::MissingHandler {
            component: "counter".into(),
            scope: EventScope::Window,
            event: "resize".into(),
        }
    );
    assert_eq!(
        err.to_string(),
        "component `counter` has no window handler for event `resize`"
    );
}

#[test]
fn redraw_scheduled_before_unmount_becomes_a_no_op() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    let (mount, instance) = mount_at(&runtime, "a");
    instance.root().dispatch_event(&Event::new("click"));
    assert!(runtime.unmount("a"));
    assert_eq!(instance.phase(), InstancePhase::Destroyed);
    assert!(!mount.has_child_nodes());

    runtime.run_until_idle();
    assert_eq!(instance.stats(), Default::default());
    assert!(!runtime.is_mounted("a"));
}

#[test]
fn remounting_after_unmount_starts_from_initial_state() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    let (mount, instance) = mount_at(&runtime, "a");
    instance.root().dispatch_event(&Event::new("click"));
    runtime.run_until_idle();
    assert_eq!(mount.text_content(), "1");

    runtime.unmount("a");
    let fresh = runtime.mount(&mount).expect("remount");
    assert_eq!(mount.text_content(), "0");
    assert_eq!(fresh.state().downcast::<i32>().ok().as_deref(), Some(&0));
}

#[test]
fn submit_default_is_prevented_for_local_handlers() {
    let (runtime, _) = runtime();
    let form = Component::new((), |_cx, _: &()| h("form").build())
        .on_local("submit", |state, _event, _| Rc::clone(state))
        .into_definition();
    runtime.register_components([("f", form)]);
    let (_mount, instance) = mount_at(&runtime, "f");
    assert!(!instance.root().dispatch_event(&Event::new("submit")));
    assert!(!runtime.has_pending_tasks());
}

#[test]
fn mount_document_fills_every_registered_viewport() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter()), ("b", counter())]);
    let body = runtime.document().body();
    body.append_child(&viewport("a"));
    body.append_child(&h("section").child(viewport("b")).child(viewport("static")).build());

    let mounted = runtime.mount_document().expect("mount");
    assert_eq!(mounted, ["a", "b"]);
    assert_eq!(runtime.mount_document().expect("second pass"), Vec::<String>::new());
    assert!(runtime
        .document()
        .get_element_by_id("static")
        .is_some_and(|node| !node.has_child_nodes()));
}

#[test]
fn replacing_components_discards_previous_definitions() {
    let (runtime, _) = runtime();
    runtime.register_components([("a", counter())]);
    runtime.register_components([("b", counter())]);
    assert_eq!(runtime.components(), ["b"]);
    assert!(runtime.component("a").is_none());
}
