use std::rc::Rc;

use vista_core::{
    h, viewport, Component, ComponentDefinition, Event, Fingerprinter, MountedInstance, Node,
    Props, RenderContext, Runtime, SharedState,
};
use vista_runtime_std::StdRuntime;

#[derive(Clone)]
struct Task {
    id: u32,
    title: &'static str,
}

impl Props for Task {
    fn fingerprint(&self, f: &mut Fingerprinter<'_>) {
        f.field("id", &self.id).field("title", self.title);
    }
}

fn task_row(_cx: &RenderContext, task: &Task) -> Node {
    log::debug!("rendering row {}", task.id);
    h("li").key(task.id).text(task.title).build()
}

fn toolbar(theme: &SharedState<&'static str>) -> Rc<dyn ComponentDefinition> {
    Component::new(false, |_cx, dark: &bool| {
        let label = if *dark { "Light mode" } else { "Dark mode" };
        h("button").text(label).build()
    })
    .on_local("click", |dark, _event, _| Rc::new(!**dark))
    .derive(
        theme.clone(),
        |old, new| old != new,
        |dark| if *dark { "dark" } else { "light" },
    )
    .tag("toolbar")
    .into_definition()
}

fn tasks(theme: &SharedState<&'static str>) -> Rc<dyn ComponentDefinition> {
    Component::with_shared(
        (theme.clone(),),
        Vec::<Task>::new(),
        |cx, tasks: &Vec<Task>, (theme,)| {
            h("section")
                .class(theme)
                .child(h("ul").children(tasks.iter().map(|task| cx.memo(task_row, task))))
                .child(viewport("counter"))
                .build()
        },
    )
    .on_window("add-task", |tasks, event, _| {
        let title = event.detail::<&'static str>().copied().unwrap_or("untitled");
        let mut next = (**tasks).clone();
        next.push(Task {
            id: next.len() as u32 + 1,
            title,
        });
        Rc::new(next)
    })
    .tag("tasks")
    .into_definition()
}

fn counter() -> Rc<dyn ComponentDefinition> {
    Component::new(0u32, |_cx, count: &u32| {
        h("button").text(format!("clicked {count} times")).build()
    })
    .on_local("click", |count, _event, _| Rc::new(**count + 1))
    .tag("counter")
    .into_definition()
}

fn click(runtime: &Runtime, id: &str) {
    match runtime.instance(id) {
        Some(instance) => {
            instance.root().dispatch_event(&Event::new("click"));
        }
        None => log::warn!("nothing mounted at `{id}`"),
    }
}

fn dump(step: &str, runtime: &Runtime) {
    println!("-- {step}");
    println!("{}", runtime.document().body().to_html());
}

fn main() {
    env_logger::init();

    println!("=== Vista Viewport Example ===");
    println!("Headless run: events are dispatched programmatically and each");
    println!("deferred redraw turn is printed as HTML.");
    println!();

    let app = StdRuntime::new();
    app.set_waker(|| log::trace!("runtime requested a turn"));
    let runtime = app.runtime();

    let theme = SharedState::new("light");
    runtime.register_components([
        ("toolbar", toolbar(&theme)),
        ("tasks", tasks(&theme)),
        ("counter", counter()),
    ]);

    let body = runtime.document().body();
    body.append_child(&viewport("toolbar"));
    body.append_child(&viewport("tasks"));

    match runtime.mount_document() {
        Ok(mounted) => log::info!("mounted {mounted:?}"),
        Err(err) => {
            log::error!("mount failed: {err}");
            return;
        }
    }
    dump("initial", &runtime);

    for title in ["write docs", "review patch"] {
        runtime
            .document()
            .window()
            .dispatch_event(&Event::new("add-task").with_detail(title));
    }
    click(&runtime, "counter");
    app.run_until_idle();
    dump("two tasks, one counter click", &runtime);

    click(&runtime, "toolbar");
    app.run_until_idle();
    dump("dark theme", &runtime);

    let stats = runtime.render_context().stats();
    println!(
        "memo: {} hits, {} misses, {} cached outputs",
        stats.hits, stats.misses, stats.entries
    );
    println!("turns run: {}", runtime.turns());
}
