//! Activation protocol: ordering, idempotence, failure containment.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use atelier::app::AppShell;
use atelier::core::{PluginDescriptor, PluginError, Token};

struct Unit;

type Trace = Rc<RefCell<Vec<String>>>;

fn traced(trace: &Trace, id: &str) -> PluginDescriptor {
    let trace = Rc::clone(trace);
    let name = id.to_string();
    PluginDescriptor::new(id).on_activate(move |_| {
        trace.borrow_mut().push(name.clone());
        Ok(None)
    })
}

fn traced_provider(trace: &Trace, id: &str, token: &Token<Unit>) -> PluginDescriptor {
    let trace = Rc::clone(trace);
    let name = id.to_string();
    PluginDescriptor::new(id)
        .provides(token)
        .on_activate(move |_| {
            trace.borrow_mut().push(name.clone());
            Ok(Some(Rc::new(Unit) as Rc<dyn Any>))
        })
}

#[tokio::test]
async fn diamond_graph_activates_in_dependency_order_exactly_once() {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let a: Token<Unit> = Token::new("a");
    let b: Token<Unit> = Token::new("b");
    let c: Token<Unit> = Token::new("c");

    let shell = AppShell::new();
    shell
        .register_plugin(traced(&trace, "sink").requires(&b).requires(&c))
        .unwrap();
    shell
        .register_plugin(traced_provider(&trace, "left", &b).requires(&a))
        .unwrap();
    shell
        .register_plugin(traced_provider(&trace, "right", &c).requires(&a))
        .unwrap();
    shell
        .register_plugin(traced_provider(&trace, "root", &a))
        .unwrap();

    shell.start().await.unwrap();

    let order = trace.borrow().clone();
    assert_eq!(order.len(), 4);
    let position =
        |id: &str| order.iter().position(|x| x == id).unwrap_or_else(|| panic!("{} missing", id));
    assert!(position("root") < position("left"));
    assert!(position("root") < position("right"));
    assert!(position("left") < position("sink"));
    assert!(position("right") < position("sink"));
    // Ties between "left" and "right" resolve in registration order.
    assert!(position("left") < position("right"));
}

#[tokio::test]
async fn activation_order_is_reproducible_across_runs() {
    let build = |trace: &Trace| {
        let token: Token<Unit> = Token::new("svc");
        let shell = AppShell::new();
        shell.register_plugin(traced(trace, "gamma")).unwrap();
        shell
            .register_plugin(traced(trace, "beta").requires(&token))
            .unwrap();
        shell
            .register_plugin(traced_provider(trace, "alpha", &token))
            .unwrap();
        shell
    };

    let first: Trace = Rc::new(RefCell::new(Vec::new()));
    build(&first).start().await.unwrap();
    let second: Trace = Rc::new(RefCell::new(Vec::new()));
    build(&second).start().await.unwrap();

    assert_eq!(*first.borrow(), *second.borrow());
    assert_eq!(*first.borrow(), vec!["gamma", "alpha", "beta"]);
}

#[tokio::test]
async fn duplicate_plugin_id_leaves_registry_unchanged() {
    let shell = AppShell::new();
    shell.register_plugin(PluginDescriptor::new("dup")).unwrap();

    let result = shell.register_plugin(PluginDescriptor::new("dup"));
    assert!(matches!(result, Err(PluginError::DuplicateId(_))));

    assert_eq!(shell.plugin_ids(), vec!["dup".to_string()]);
    shell.start().await.unwrap();
    assert!(shell.is_plugin_active("dup"));
}

#[tokio::test]
async fn dependency_cycle_fails_before_any_activation() {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let a: Token<Unit> = Token::new("a");
    let b: Token<Unit> = Token::new("b");

    let shell = AppShell::new();
    shell
        .register_plugin(traced_provider(&trace, "first", &a).requires(&b))
        .unwrap();
    shell
        .register_plugin(traced_provider(&trace, "second", &b).requires(&a))
        .unwrap();
    shell.register_plugin(traced(&trace, "bystander")).unwrap();

    let result = shell.start().await;
    assert!(matches!(result, Err(PluginError::DependencyCycle(_))));
    assert!(trace.borrow().is_empty());
    assert!(!shell.is_plugin_active("first"));
    assert!(!shell.is_plugin_active("bystander"));
}

#[tokio::test]
async fn absent_optional_dependency_resolves_to_none() {
    let token: Token<Unit> = Token::new("maybe");
    let observed: Rc<RefCell<Option<bool>>> = Rc::new(RefCell::new(None));

    let shell = AppShell::new();
    shell
        .register_plugin(PluginDescriptor::new("consumer").optional(&token).on_activate({
            let token = token.clone();
            let observed = Rc::clone(&observed);
            move |shell| {
                *observed.borrow_mut() = Some(shell.try_service(&token).is_some());
                Ok(None)
            }
        }))
        .unwrap();

    shell.start().await.unwrap();
    assert_eq!(*observed.borrow(), Some(false));
    assert!(shell.is_plugin_active("consumer"));
}

#[tokio::test]
async fn present_optional_provider_activates_first() {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let token: Token<Unit> = Token::new("maybe");

    let shell = AppShell::new();
    shell
        .register_plugin(traced(&trace, "consumer").optional(&token))
        .unwrap();
    shell
        .register_plugin(traced_provider(&trace, "provider", &token))
        .unwrap();

    shell.start().await.unwrap();
    assert_eq!(*trace.borrow(), vec!["provider", "consumer"]);
}

#[tokio::test]
async fn reactivation_does_not_rerun_or_reregister() {
    let token: Token<Unit> = Token::new("svc");
    let runs = Rc::new(RefCell::new(0));

    let shell = AppShell::new();
    shell
        .register_plugin(
            PluginDescriptor::new("provider")
                .provides(&token)
                .auto_start(false)
                .on_activate({
                    let runs = Rc::clone(&runs);
                    move |_| {
                        *runs.borrow_mut() += 1;
                        Ok(Some(Rc::new(Unit) as Rc<dyn Any>))
                    }
                }),
        )
        .unwrap();

    shell.activate_plugin("provider").await.unwrap();
    shell.activate_plugin("provider").await.unwrap();
    shell.start().await.unwrap();

    assert_eq!(*runs.borrow(), 1);
    assert!(shell.service(&token).is_ok());
}

#[tokio::test]
async fn failure_is_reported_with_plugin_id_and_halts_walk() {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let token: Token<Unit> = Token::new("svc");

    let shell = AppShell::new();
    shell
        .register_plugin(traced_provider(&trace, "ok", &token))
        .unwrap();
    shell
        .register_plugin(
            PluginDescriptor::new("flaky")
                .requires(&token)
                .on_activate(|_| Err("backend refused to start".into())),
        )
        .unwrap();
    shell.register_plugin(traced(&trace, "after")).unwrap();

    match shell.start().await {
        Err(PluginError::ActivationFailed { plugin, message }) => {
            assert_eq!(plugin, "flaky");
            assert!(message.contains("backend refused"));
        }
        other => panic!("expected activation failure, got {:?}", other.map(|_| ())),
    }

    // Fail-fast: the walk stopped, earlier services stay valid.
    assert_eq!(*trace.borrow(), vec!["ok"]);
    assert!(shell.service(&token).is_ok());
}

#[tokio::test]
async fn failed_plugin_does_not_rerun_on_retry() {
    let runs = Rc::new(RefCell::new(0));

    let shell = AppShell::new();
    shell
        .register_plugin(PluginDescriptor::new("flaky").on_activate({
            let runs = Rc::clone(&runs);
            move |_| {
                *runs.borrow_mut() += 1;
                Err("still broken".into())
            }
        }))
        .unwrap();

    assert!(shell.start().await.is_err());
    assert!(shell.activate_plugin("flaky").await.is_err());
    assert_eq!(*runs.borrow(), 1);
}

#[tokio::test]
async fn async_activation_suspends_without_breaking_order() {
    let trace: Trace = Rc::new(RefCell::new(Vec::new()));
    let token: Token<Unit> = Token::new("svc");

    let shell = AppShell::new();
    shell
        .register_plugin(
            PluginDescriptor::new("slow-provider")
                .provides(&token)
                .on_activate_async({
                    let trace = Rc::clone(&trace);
                    move |_| {
                        let trace = Rc::clone(&trace);
                        Box::pin(async move {
                            tokio::task::yield_now().await;
                            trace.borrow_mut().push("slow-provider".to_string());
                            Ok(Some(Rc::new(Unit) as Rc<dyn Any>))
                        })
                    }
                }),
        )
        .unwrap();
    shell
        .register_plugin(traced(&trace, "consumer").requires(&token))
        .unwrap();

    shell.start().await.unwrap();
    assert_eq!(*trace.borrow(), vec!["slow-provider", "consumer"]);
}
