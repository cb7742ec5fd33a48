use std::rc::Rc;

use vista_core::{ComponentDefinition, InstancePhase};
use vista_testing::prelude::*;

fn counter() -> Rc<dyn ComponentDefinition> {
    Component::new(0i32, |_cx, count: &i32| h("b").text(count).build())
        .on_local("click", |count, _event, _| Rc::new(**count + 1))
        .into_definition()
}

#[derive(Clone, PartialEq)]
struct Shell {
    title: u32,
    show_child: bool,
    aside: bool,
}

fn shell() -> Rc<dyn ComponentDefinition> {
    let initial = Shell {
        title: 0,
        show_child: true,
        aside: false,
    };
    Component::new(initial, |_cx, shell: &Shell| {
        let mut root = h("div").child(h("h1").text(format!("title {}", shell.title)));
        if shell.show_child {
            let container = if shell.aside { h("aside") } else { h("section") };
            root = root.child(container.child(viewport("child")));
        }
        root.child(viewport("static")).build()
    })
    .on_local("retitle", |shell, _event, _| {
        Rc::new(Shell {
            title: shell.title + 1,
            ..(**shell).clone()
        })
    })
    .on_local("hide", |shell, _event, _| {
        Rc::new(Shell {
            show_child: !shell.show_child,
            ..(**shell).clone()
        })
    })
    .on_local("move", |shell, _event, _| {
        Rc::new(Shell {
            aside: !shell.aside,
            ..(**shell).clone()
        })
    })
    .on_local("click", |shell, _event, _| {
        Rc::new(Shell {
            title: 100,
            ..(**shell).clone()
        })
    })
    .into_definition()
}

fn setup(rule: &VistaTestRule) -> Rc<dyn MountedInstance> {
    rule.register([("shell", shell()), ("child", counter())]);
    rule.mount("shell").expect("mount shell")
}

fn click_child(rule: &VistaTestRule, times: usize) {
    for _ in 0..times {
        rule.dispatch("child", "click");
    }
    rule.pump_until_idle();
}

#[test]
fn nested_viewports_mount_during_the_first_draw() {
    run_test_runtime(|rule| {
        setup(rule);
        assert_eq!(rule.runtime().mounted_ids(), ["child", "shell"]);
        assert_eq!(rule.text("child").as_deref(), Some("0"));
        assert_eq!(rule.text("shell").as_deref(), Some("title 00"));
    });
}

#[test]
fn local_events_stop_at_the_nested_instance() {
    run_test_runtime(|rule| {
        let shell_instance = setup(rule);
        click_child(rule, 1);
        let state = shell_instance.state().downcast::<Shell>().expect("shell state");
        assert_eq!(state.title, 0);
        assert_eq!(rule.text("child").as_deref(), Some("1"));
    });
}

#[test]
fn occupied_viewport_survives_a_parent_redraw() {
    run_test_runtime(|rule| {
        let shell_instance = setup(rule);
        click_child(rule, 2);
        let child = rule.instance("child").expect("child");
        let child_root = child.root();
        let child_stats = child.stats();

        rule.dispatch("shell", "retitle");
        rule.pump_until_idle();

        assert_eq!(shell_instance.stats().patches, 1);
        let after = rule.instance("child").expect("child after");
        assert!(Rc::ptr_eq(&child, &after));
        assert_eq!(after.phase(), InstancePhase::Idle);
        assert_eq!(after.stats(), child_stats);
        assert!(after.root().ptr_eq(&child_root));
        assert_eq!(rule.text("child").as_deref(), Some("2"));
        assert_eq!(rule.text("shell").as_deref(), Some("title 12"));
    });
}

#[test]
fn removed_viewport_destroys_its_instance_and_returning_creates_a_new_one() {
    run_test_runtime(|rule| {
        setup(rule);
        click_child(rule, 3);
        let child = rule.instance("child").expect("child");

        rule.dispatch("shell", "hide");
        rule.pump_until_idle();
        assert_eq!(child.phase(), InstancePhase::Destroyed);
        assert!(rule.instance("child").is_none());
        assert!(rule.find("child").is_none());

        rule.dispatch("shell", "hide");
        rule.pump_until_idle();
        let fresh = rule.instance("child").expect("recreated");
        assert!(!Rc::ptr_eq(&child, &fresh));
        assert_eq!(rule.text("child").as_deref(), Some("0"));
    });
}

#[test]
fn relocated_viewport_reattaches_the_existing_instance() {
    run_test_runtime(|rule| {
        setup(rule);
        click_child(rule, 2);
        let child = rule.instance("child").expect("child");
        let child_root = child.root();

        rule.dispatch("shell", "move");
        rule.pump_until_idle();

        let after = rule.instance("child").expect("child after move");
        assert!(Rc::ptr_eq(&child, &after));
        assert_eq!(after.phase(), InstancePhase::Idle);
        let mount = rule.find("child").expect("mount point");
        assert_eq!(mount.parent().and_then(|p| p.tag().map(str::to_owned)).as_deref(), Some("aside"));
        assert!(child_root.parent().is_some_and(|p| p.ptr_eq(&mount)));
        assert_eq!(rule.text("child").as_deref(), Some("2"));

        click_child(rule, 1);
        assert_eq!(rule.text("child").as_deref(), Some("3"));
    });
}

#[test]
fn unregistered_viewport_stays_vacant() {
    run_test_runtime(|rule| {
        setup(rule);
        rule.dispatch("shell", "retitle");
        rule.pump_until_idle();
        let vacant = rule.find("static").expect("static viewport");
        assert!(!vacant.has_child_nodes());
        assert!(!rule.runtime().is_mounted("static"));
    });
}

#[test]
fn one_instance_per_mount_point_id() {
    run_test_runtime(|rule| {
        setup(rule);
        let err = rule.mount("child").err();
        assert_eq!(err, Some(RuntimeError::DuplicateMountPoint { id: "child".into() }));

        let ids = rule.runtime().mounted_ids();
        let mut unique = ids.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), ids.len());
    });
}

#[test]
fn unmounting_a_parent_destroys_nested_instances() {
    run_test_runtime(|rule| {
        let shell_instance = setup(rule);
        let child = rule.instance("child").expect("child");
        assert!(rule.runtime().unmount("shell"));
        assert_eq!(shell_instance.phase(), InstancePhase::Destroyed);
        assert_eq!(child.phase(), InstancePhase::Destroyed);
        assert!(rule.runtime().mounted_ids().is_empty());
    });
}

#[test]
fn parent_root_replacement_reattaches_nested_instance() {
    run_test_runtime(|rule| {
        let frame = Component::new(false, |_cx, wide: &bool| {
            let root = if *wide { h("main") } else { h("div") };
            root.child(viewport("inner")).build()
        })
        .on_local("widen", |wide, _event, _| Rc::new(!**wide))
        .into_definition();
        rule.register([("frame", frame), ("inner", counter())]);
        let frame_instance = rule.mount("frame").expect("mount");
        rule.dispatch("inner", "click");
        rule.pump_until_idle();
        let inner = rule.instance("inner").expect("inner");

        rule.dispatch("frame", "widen");
        rule.pump_until_idle();

        assert_eq!(frame_instance.stats().replacements, 1);
        assert_eq!(frame_instance.root().tag(), Some("main"));
        let after = rule.instance("inner").expect("inner after");
        assert!(Rc::ptr_eq(&inner, &after));
        assert_eq!(rule.text("inner").as_deref(), Some("1"));
    });
}
