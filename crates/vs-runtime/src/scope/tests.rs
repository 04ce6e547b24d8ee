use super::*;
use crate::helpers::HelperRegistry;
use std::cell::RefCell;

use vs_core::{recorder, Dependency, Function, ObservableValue, Queue, ScopeError, ValueObservable};

fn object(entries: &[(&str, Value)]) -> Value {
    Value::object(entries.iter().map(|(key, value)| (*key, value.clone())))
}

fn map(entries: &[(&str, Value)]) -> ObservableMap {
    ObservableMap::from_entries(entries.iter().map(|(key, value)| (*key, value.clone())))
}

fn empty() -> Value {
    object(&[])
}

#[test]
fn add_reuses_the_node_for_the_same_context() {
    let base = Scope::from_context(empty());
    let context = object(&[("foo", Value::from("bar"))]);
    let child = base.add(context.clone());

    assert_eq!(child.context(), &context);
    assert!(child.add(context).ptr_eq(&child));
    assert!(!base.add(empty()).ptr_eq(&base));
}

#[test]
fn bare_keys_stop_at_the_nearest_context() {
    let root = Scope::from_context(object(&[("foo", Value::from("root"))]));
    let middle = root.add(object(&[("foo", Value::from("middle"))]));
    let inner = middle.add(empty());

    assert_eq!(inner.get("foo"), Value::Undefined);
    assert_eq!(inner.find("foo"), Value::from("middle"));
    assert_eq!(
        inner.get_with("foo", &ScopeOptions::default().whole_chain()),
        Value::from("middle")
    );
    assert_eq!(middle.get("foo"), Value::from("middle"));
}

#[test]
fn parent_paths_hop_to_the_enclosing_context() {
    let brian = Scope::from_context(object(&[("name", Value::from("Brian"))]));
    let justin = brian.add(object(&[("name", Value::from("Justin"))]));

    assert_eq!(justin.get("name"), Value::from("Justin"));
    assert_eq!(justin.get("../name"), Value::from("Brian"));
    assert_eq!(justin.get(".."), *brian.context());
    assert_eq!(justin.get("this"), *justin.context());
    assert_eq!(justin.get("./name"), Value::from("Justin"));

    let read = brian.read("../name", &ScopeOptions::default());
    assert!(read.no_context_available);
    assert!(brian.read("..", &ScopeOptions::default()).no_context_available);
}

#[test]
fn special_frames_are_only_visible_to_special_reads() {
    let base = Scope::from_context(object(&[("name", Value::from("context"))]));
    let special = base.add_with(
        object(&[("index", Value::from(0)), ("name", Value::from("special"))]),
        ScopeMeta::special(),
    );
    let inner = special.add(empty());

    assert_eq!(special.get("name"), Value::from("context"));
    assert_eq!(special.get("./name"), Value::from("context"));
    assert_eq!(special.get("this"), *base.context());
    assert_eq!(inner.get("../name"), Value::from("context"));
    assert_eq!(
        special.get_with("name", &ScopeOptions::special()),
        Value::from("special")
    );
    assert_eq!(inner.get("scope.index"), Value::from(0));
    assert_eq!(base.get_with("name", &ScopeOptions::special()), Value::Undefined);
}

#[test]
fn not_context_frames_are_walked_past_by_parent_paths() {
    let base = Scope::from_context(object(&[("name", Value::from("outer"))]));
    let placeholder = base.add_with(object(&[("name", Value::from("hidden"))]), ScopeMeta::not_context());
    let inner = placeholder.add(object(&[("name", Value::from("inner"))]));

    assert_eq!(inner.get("../name"), Value::from("outer"));
    assert!(placeholder.is_special());
}

#[test]
fn set_then_get_round_trips() {
    let scope = Scope::from_context(empty());
    let outcome = scope
        .try_set("foo", Value::from("bar"), &ScopeOptions::default())
        .expect("set should succeed");
    assert_eq!(outcome.how, "write");
    assert_eq!(scope.get("foo"), Value::from("bar"));

    let observed = map(&[]);
    let scope = Scope::from_context(Value::Map(observed.clone()));
    let outcome = scope
        .try_set("foo", Value::from("bar"), &ScopeOptions::default())
        .expect("set should succeed");
    assert_eq!(outcome.how, "setKeyValue");
    assert_eq!(observed.peek("foo"), Value::from("bar"));
    assert_eq!(scope.get("foo"), Value::from("bar"));
}

#[test]
fn nested_paths_write_through_plain_objects_maps_and_observables() {
    let comp = ObservableValue::new(Value::from("Test"));
    let person = object(&[("name", Value::from("David"))]);
    let scope = Scope::from_context(object(&[
        ("name", Value::from("Matthew")),
        (
            "other",
            object(&[("person", person), ("comp", comp.to_value())]),
        ),
    ]));

    scope.set("name", Value::from("Wilbur"), &ScopeOptions::default());
    assert_eq!(scope.get("name"), Value::from("Wilbur"));

    scope.set("other.person.name", Value::from("Dave"), &ScopeOptions::default());
    assert_eq!(scope.get("other.person.name"), Value::from("Dave"));

    let outcome = scope
        .try_set("other.comp", Value::from("Changed"), &ScopeOptions::default())
        .expect("set should succeed");
    assert_eq!(outcome.how, "setValue");
    assert_eq!(comp.get(), Value::from("Changed"));

    let other = map(&[("name", Value::from("Justin"))]);
    let scope = Scope::from_context(Value::Map(map(&[("other", Value::Map(other.clone()))])));
    scope.set("other.name", Value::from("Brian"), &ScopeOptions::default());
    assert_eq!(scope.get("other.name"), Value::from("Brian"));
    assert_eq!(other.peek("name"), Value::from("Brian"));
}

#[test]
fn observable_contexts_are_set_through_this_and_parent_paths() {
    let value = ObservableValue::new(Value::from(1));
    let scope = Scope::from_context(value.to_value());

    scope.set("this", Value::from(2), &ScopeOptions::default());
    assert_eq!(scope.get("this"), Value::from(2));
    scope.set(".", Value::from(3), &ScopeOptions::default());
    assert_eq!(scope.get("this"), Value::from(3));

    let child = scope.add(empty());
    let outcome = child
        .try_set("..", Value::from(4), &ScopeOptions::default())
        .expect("set should succeed");
    assert_eq!(outcome.how, "setValue");
    assert_eq!(child.get(".."), Value::from(4));
    assert_eq!(value.get(), Value::from(4));
}

#[test]
fn parent_keys_are_set_on_the_parent_map() {
    let parent = map(&[]);
    let scope = Scope::from_context(Value::Map(parent.clone()));
    let top = scope.add(Value::Map(map(&[])));

    let outcome = top
        .try_set("../foo", Value::from("bar"), &ScopeOptions::default())
        .expect("set should succeed");
    assert_eq!(outcome.how, "setKeyValue");
    assert_eq!(parent.peek("foo"), Value::from("bar"));

    let plan = top
        .plan_set("../foo", &ScopeOptions::default())
        .expect("plan should resolve");
    assert_eq!(plan.how(), "set");
}

#[test]
fn setting_into_a_non_observable_parent_merges_deeply() {
    let colors = map(&[("prop", Value::from("foo")), ("stale", Value::from(true))]);
    let scope = Scope::from_context(object(&[("colors", Value::Map(colors.clone()))]));

    let outcome = scope
        .try_set(
            "colors",
            object(&[("prop", Value::from("bar"))]),
            &ScopeOptions::default(),
        )
        .expect("set should succeed");

    assert_eq!(outcome.how, "updateDeep");
    assert_eq!(
        outcome.warning.as_deref(),
        Some("Merging data into \"colors\" because its parent is non-observable")
    );
    assert_eq!(scope.get("colors.prop"), Value::from("bar"));
    assert_eq!(scope.peek("colors"), Value::Map(colors.clone()));
    assert!(!colors.has_key("stale"));
}

#[test]
fn writing_below_an_undefined_path_is_an_error() {
    let scope = Scope::from_context(empty());

    let error = scope
        .try_set("../person.name", Value::from("Christopher"), &ScopeOptions::default())
        .expect_err("set should fail");
    assert_eq!(error.code(), "SCOPE_SET_UNDEFINED");
    assert_eq!(
        error.to_string(),
        "Attempting to set a value at ../person.name where ../person is undefined."
    );

    let error = scope
        .try_set("missing.name", Value::from(1), &ScopeOptions::default())
        .expect_err("set should fail");
    assert_eq!(error, ScopeError::undefined_target("missing.name", "missing"));

    scope.set("missing.name", Value::from(1), &ScopeOptions::default());
    assert_eq!(scope.get("missing"), Value::Undefined);
}

#[test]
fn parent_writes_without_a_parent_report_no_context() {
    let scope = Scope::from_context(Value::Map(map(&[])));
    let error = scope
        .try_set("../foo", Value::from(1), &ScopeOptions::default())
        .expect_err("set should fail");
    assert_eq!(error.code(), "SCOPE_NO_CONTEXT");
}

#[test]
fn variable_frames_shadow_bare_keys_only() {
    let root = object(&[
        ("rootProp", Value::from("ROOT")),
        ("conflictProp", Value::from("ROOT")),
    ]);
    let variables = || {
        object(&[
            ("variableProp", Value::from("VARIABLE")),
            ("conflictProp", Value::from("VARIABLE")),
        ])
    };

    let scope = Scope::from_context(root.clone()).add_with(variables(), ScopeMeta::variable());
    assert_eq!(scope.get("variableProp"), Value::from("VARIABLE"));
    assert_eq!(scope.get("rootProp"), Value::from("ROOT"));
    assert_eq!(scope.get("this.rootProp"), Value::from("ROOT"));
    assert_eq!(scope.get("this.conflictProp"), Value::from("ROOT"));
    assert_eq!(scope.get("./conflictProp"), Value::from("ROOT"));
    assert_eq!(scope.get("conflictProp"), Value::from("VARIABLE"));
    assert_eq!(scope.get("this"), root);

    let root2 = object(&[
        ("root2Prop", Value::from("ROOT2")),
        ("conflictProp", Value::from("ROOT2")),
    ]);
    let scope2 = Scope::from_context(root.clone())
        .add(root2.clone())
        .add_with(variables(), ScopeMeta::variable());
    assert_eq!(scope2.get("this.root2Prop"), Value::from("ROOT2"));
    assert_eq!(scope2.get("./conflictProp"), Value::from("ROOT2"));
    assert_eq!(scope2.get("conflictProp"), Value::from("VARIABLE"));
    assert_eq!(scope2.get("../conflictProp"), Value::from("ROOT"));

    let scope3 = Scope::from_context(root)
        .add(root2)
        .add(object(&[("conflictProp", Value::from("ROOT3"))]))
        .add_with(variables(), ScopeMeta::variable());
    assert_eq!(scope3.get("../../conflictProp"), Value::from("ROOT"));
}

#[test]
fn let_contexts_only_capture_writes_to_keys_they_hold() {
    let root = map(&[("name", Value::from("ROOT"))]);

    let scope = Scope::from_context(Value::Map(root.clone())).add_let_context(Value::Undefined);
    scope.set("rootProp", Value::from("VALUE"), &ScopeOptions::default());
    assert_eq!(root.peek("rootProp"), Value::from("VALUE"));

    let scope = Scope::from_context(Value::Map(root.clone()))
        .add_let_context(object(&[("tempProp", Value::Undefined)]));
    scope.set("tempProp", Value::from("foo"), &ScopeOptions::default());
    assert_eq!(root.peek("tempProp"), Value::Undefined);
    assert_eq!(scope.get("tempProp"), Value::from("foo"));
}

#[test]
fn helpers_are_consulted_after_the_chain() {
    HelperRegistry::register_value("siteName", Value::from("global"));
    HelperRegistry::register("greeting", Function::new("greeting", |_, _| Value::from("hello")));

    let owner = Scope::from_context(object(&[("siteName", Value::from("context"))]));
    assert_eq!(owner.get("siteName"), Value::from("context"));

    let scope = Scope::from_context(empty());
    assert_eq!(scope.get("siteName"), Value::from("global"));
    assert_eq!(scope.get("greeting"), Value::from("hello"));

    let local = Scope::from_context(empty()).add_template_context().add(empty());
    local
        .template_context()
        .helpers
        .set("siteName", Value::from("local"));
    assert_eq!(local.get("siteName"), Value::from("local"));

    HelperRegistry::unregister("siteName");
    HelperRegistry::unregister("greeting");
    assert_eq!(scope.get("siteName"), Value::Undefined);
}

#[test]
fn filename_and_line_number_are_shared_across_the_chain() {
    let parent = Scope::from_context(empty());
    let scope = parent.add(empty());

    parent.set("scope.filename", Value::from("my-cool-file.txt"), &ScopeOptions::default());
    parent.set("scope.lineNumber", Value::from("5"), &ScopeOptions::default());

    assert_eq!(scope.peek("scope.filename"), Value::from("my-cool-file.txt"));
    assert_eq!(scope.peek("scope.lineNumber"), Value::from("5"));
    assert_eq!(scope.filename(), Value::from("my-cool-file.txt"));
    assert!(parent.get_template_context().ptr_eq(&scope.get_template_context()));
}

#[test]
fn legacy_star_keys_alias_template_vars() {
    let scope = Scope::from_context(empty());
    scope.template_context().vars.set("count", Value::from(1));

    assert_eq!(scope.get("*count"), Value::from(1));
    assert_eq!(scope.get("scope.vars.count"), Value::from(1));

    scope.set("*count", Value::from(2), &ScopeOptions::default());
    assert_eq!(scope.template_context().vars.peek("count"), Value::from(2));
}

#[test]
fn scope_namespace_exposes_view_models_and_root() {
    let root = object(&[("name", Value::from("root"))]);
    let outer_vm = object(&[("name", Value::from("outer"))]);
    let inner_vm = object(&[("name", Value::from("inner"))]);
    let leaf = Scope::from_context(root.clone())
        .add_with(outer_vm.clone(), ScopeMeta::view_model())
        .add(empty())
        .add_with(inner_vm.clone(), ScopeMeta::view_model())
        .add(empty());

    assert_eq!(leaf.get_view_model(), Some(inner_vm.clone()));
    assert_eq!(leaf.get_top(), Some(outer_vm.clone()));
    assert_eq!(leaf.get_root(), root);
    assert_eq!(leaf.get("scope.vm"), inner_vm);
    assert_eq!(leaf.get("scope.top.name"), Value::from("outer"));
    assert_eq!(leaf.get("scope.root"), root);
    assert_eq!(leaf.get("scope"), leaf.to_value());

    leaf.get_template_context();
    assert_eq!(leaf.get_root(), root);
}

#[test]
fn scope_methods_are_callable_from_the_namespace() {
    let context = map(&[("name", Value::from("Justin"))]);
    let scope = Scope::from_context(Value::Map(context.clone()));

    let get = scope.get("scope.get");
    let get = get.as_function().expect("scope.get should be a function");
    assert_eq!(get.call(&Value::Undefined, &[Value::from("name")]), Value::from("Justin"));

    let set = scope.get("scope.set");
    let set = set.as_function().expect("scope.set should be a function");
    set.call(&Value::Undefined, &[Value::from("name"), Value::from("Brian")]);
    assert_eq!(context.peek("name"), Value::from("Brian"));
}

#[test]
fn has_key_only_checks_the_own_context() {
    let parent = Scope::from_context(object(&[("outer", Value::from(1))]));
    let scope = parent.add(object(&[("present", Value::Undefined)]));

    assert!(scope.has_key("present"));
    assert!(!scope.has_key("outer"));
    assert!(!scope.has_key("missing"));
    assert!(scope.has_key("scope.filename"));
}

#[test]
fn clone_from_ref_rebuilds_frames_above_the_template_context() {
    let base = Scope::from_context(empty());
    let first = empty();
    let second = empty();
    let leaf = base.add_template_context().add(first.clone()).add(second.clone());

    let cloned = leaf.clone_from_ref();
    assert_eq!(cloned.context(), &second);
    let parent = cloned.parent().expect("clone should keep the first frame");
    assert_eq!(parent.context(), &first);
    let grandparent = parent.parent().expect("clone should sit on the base");
    assert!(grandparent.ptr_eq(&base));
}

#[test]
fn paths_for_key_list_every_way_to_reach_it() {
    let greet = Function::new("greet", |_, _| Value::from("hi"));
    let base = Scope::from_context(object(&[("name", Value::from("root"))]));
    let leaf = base
        .add_with(
            object(&[("name", Value::from("vm")), ("greet", Value::Function(greet))]),
            ScopeMeta::view_model(),
        )
        .add(object(&[("other", Value::from(1))]));

    let names: Vec<String> = leaf.get_paths_for_key("name").into_keys().collect();
    assert_eq!(
        names,
        vec!["../../name", "../name", "scope.top.name", "scope.vm.name"]
    );

    let greets: Vec<String> = leaf.get_paths_for_key("scope.vm.greet").into_keys().collect();
    assert_eq!(greets, vec!["../greet()", "scope.top.greet()", "scope.vm.greet()"]);
}

#[test]
fn compute_data_is_cached_per_node_and_key() {
    let scope = Scope::from_context(Value::Map(map(&[("foo", Value::from("bar"))])));
    let first = scope.compute_data("foo", ScopeOptions::default());
    let second = scope.compute_data("foo", ScopeOptions::default());
    assert!(first.ptr_eq(&second));
    assert_eq!(first.get(), Value::from("bar"));
    assert!(scope.compute("foo").is_value_like());
}

fn records(dependencies: &[Dependency], map: &ObservableMap, key: &str) -> bool {
    let expected = Dependency::key(map, key);
    dependencies.iter().any(|dependency| dependency.same_as(&expected))
}

#[test]
fn misses_record_every_examined_frame() {
    let root = map(&[]);
    let child = map(&[]);
    let scope = Scope::from_context(Value::Map(root.clone())).add(Value::Map(child.clone()));

    let recording = recorder::start();
    let found = scope.read("foo", &ScopeOptions::default().whole_chain());
    let dependencies = recording.stop();

    assert_eq!(found.value, Value::Undefined);
    assert!(records(&dependencies, &child, "foo"));
    assert!(records(&dependencies, &root, "foo"));
}

#[test]
fn hits_only_record_the_frame_that_answered() {
    let root = map(&[("foo", Value::from("root"))]);
    let child = map(&[]);
    let scope = Scope::from_context(Value::Map(root.clone())).add(Value::Map(child.clone()));

    let recording = recorder::start();
    let found = scope.read("foo", &ScopeOptions::default().whole_chain());
    let dependencies = recording.stop();

    assert_eq!(found.value, Value::from("root"));
    assert_eq!(found.root_observe, Some(Value::Map(root.clone())));
    assert_eq!(dependencies.len(), 1);
    assert!(records(&dependencies, &root, "foo"));
    assert!(!records(&dependencies, &child, "foo"));
}

#[test]
fn undefined_paths_report_the_deepest_examined_observable() {
    let person = map(&[]);
    let root = map(&[("person", Value::Map(person))]);
    let child = map(&[]);
    let scope = Scope::from_context(Value::Map(root.clone())).add(Value::Map(child));

    let found = scope.read("person.name.first", &ScopeOptions::default().whole_chain());

    assert_eq!(found.value, Value::Undefined);
    assert_eq!(found.set_root, Some(Value::Map(root)));
    let keys: Vec<&str> = found.reads.iter().map(|read| read.key.as_str()).collect();
    assert_eq!(keys, ["person", "name", "first"]);
}

#[test]
fn a_bound_wrapper_hears_about_a_key_added_later() {
    let root = map(&[]);
    let scope = Scope::from_context(Value::Map(root.clone()));
    let key_data = scope.compute_data("foo", ScopeOptions::default());

    let events = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    let id = key_data.on_value(
        Rc::new(move |new_value: &Value, _: &Value| sink.borrow_mut().push(new_value.clone())),
        Queue::Mutate,
    );
    assert_eq!(key_data.get(), Value::Undefined);
    assert_eq!(root.handler_count("foo"), 1);

    root.set("foo", Value::from("bar"));
    assert_eq!(*events.borrow(), vec![Value::from("bar")]);
    assert_eq!(key_data.get(), Value::from("bar"));

    key_data.off_value(id);
    assert_eq!(root.total_handler_count(), 0);
}
