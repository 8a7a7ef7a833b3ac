use core::cell::{Cell, RefCell};
use pretty_assertions::assert_eq;
use serde_json::json;
use sg_mvvm::{callback, scheduler, Error, Flags, ItemKey, KeyValueStore, MemoryStore, Model, ModelClass, OnOptions, Registry, TypeTag, Value};
use std::rc::Rc;

fn init_logging() {
	let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("sg_mvvm=trace").try_init();
}

fn build(class: &Rc<ModelClass>) -> Model {
	Model::builder(class).registry(Registry::new()).build().unwrap()
}

fn counter(model: &Model, name: &str) -> Rc<Cell<usize>> {
	let count = Rc::new(Cell::new(0));
	let counted = Rc::clone(&count);
	model.on(name, callback(move |_, _| counted.set(counted.get() + 1))).unwrap();
	count
}

#[test]
fn numbers_are_coerced_from_locale_text() {
	init_logging();
	let class = ModelClass::builder("Amount").default("n", 3.5).build();
	let model = build(&class);
	assert_eq!(model.get("n").unwrap(), Value::from(3.5));
	assert_eq!(model.declared_type("n"), Some(TypeTag::Number));

	assert!(model.set("n", "4,2").unwrap());
	assert_eq!(model.get("n").unwrap(), Value::from(4.2));
	assert!(model.has_changed());
	assert!(matches!(model.set("n", "four"), Err(Error::Unparsable { .. })));
	assert_eq!(model.get("n").unwrap(), Value::from(4.2));
}

#[test]
fn arrays_keep_their_identity() {
	let class = ModelClass::builder("List").default("arr", Vec::<Value>::new()).build();
	let model = build(&class);
	let before = model.get("arr").unwrap();
	assert!(model.set("arr", Value::array([1, 2, 3])).unwrap());
	let after = model.get("arr").unwrap();
	assert!(before.same(&after));
	assert_eq!(before, Value::array([1, 2, 3]));

	// Same shape, nothing to notify. Flushing first settles the earlier write.
	scheduler::flush();
	let count = counter(&model, "arr");
	assert!(!model.set("arr", Value::array([1, 2, 3])).unwrap());
	assert_eq!(count.get(), 0);
	assert!(!model.set_with("arr", Value::array([1, 2, 3]), Flags::FORCE_CALLBACKS).unwrap());
	assert_eq!(count.get(), 1);
}

#[test]
fn sets_add_unique_members() {
	let class = ModelClass::builder("Tagged").typed("tags", Value::set::<Value>([]), TypeTag::Set).build();
	let model = build(&class);
	model.set("tags", Value::set(["a", "b"])).unwrap();
	assert!(!model.add_to("tags", "a", None, Flags::empty()).unwrap());
	assert!(model.add_to("tags", "c", None, Flags::empty()).unwrap());
	assert_eq!(model.size("tags").unwrap(), 3);

	assert!(model.remove_from("tags", ItemKey::from("b"), Flags::empty()).unwrap());
	assert!(matches!(model.remove_from("tags", 0_usize, Flags::empty()), Err(Error::KeyMismatch { .. })));
	let mut members = Vec::new();
	model.for_each("tags", |_, member| members.push(member.to_display_string())).unwrap();
	assert_eq!(members, ["a", "c"]);
}

#[test]
fn collections_by_key() {
	let class = ModelClass::builder("Rows")
		.typed("rows", Vec::<Value>::new(), TypeTag::Array)
		.typed("names", Vec::<Value>::new(), TypeTag::Array)
		.typed("lookup", Value::map::<Value, Value>([]), TypeTag::Map)
		.typed("fields", Value::object::<String, Value>([]), TypeTag::Object)
		.build();
	let model = build(&class);
	for (id, code) in [(1, "a"), (2, "b"), (3, "c")] {
		model
			.add_to("rows", Value::object([("id", Value::from(id)), ("code", Value::from(code))]), None, Flags::empty())
			.unwrap();
	}
	assert!(model.remove_from("rows", 2_i64, Flags::empty()).unwrap());
	assert!(model.remove_from("rows", "c", Flags::empty()).unwrap());
	assert!(!model.remove_from("rows", 9_i64, Flags::empty()).unwrap());
	assert_eq!(model.get_data()["rows"], json!([{ "id": 1, "code": "a" }]));

	model.add_to("names", "x", None, Flags::empty()).unwrap();
	model.add_to("names", "w", Some(ItemKey::Index(0)), Flags::empty()).unwrap();
	assert_eq!(model.get_data()["names"], json!(["w", "x"]));
	assert!(matches!(model.remove_from("names", 1_i64, Flags::empty()), Err(Error::KeyMismatch { .. })));

	assert!(model.add_to("lookup", 10, Some(ItemKey::from("k")), Flags::empty()).unwrap());
	assert!(!model.add_to("lookup", 10, Some(ItemKey::from("k")), Flags::empty()).unwrap());
	assert!(model.add_to("lookup", 11, Some(ItemKey::from("k")), Flags::empty()).unwrap());
	assert_eq!(model.get_data()["lookup"], json!([["k", 11]]));

	assert!(model.add_to("fields", true, Some(ItemKey::from("on")), Flags::empty()).unwrap());
	assert!(matches!(model.add_to("fields", true, None, Flags::empty()), Err(Error::KeyMismatch { .. })));
	assert!(model.remove_from("fields", "on", Flags::empty()).unwrap());
	assert_eq!(model.size("fields").unwrap(), 0);
}

#[test]
fn clearing_twice_changes_nothing() {
	let class = ModelClass::builder("Everything")
		.default("n", 7)
		.default("s", "text")
		.default("b", true)
		.default("xy", Value::xy(1.0, 2.0))
		.default("list", Value::array([1, 2]))
		.default("object", Value::object([("a", 1)]))
		.typed("set", Value::set([1]), TypeTag::Set)
		.typed("map", Value::map([("k", 1)]), TypeTag::Map)
		.typed("numbers", Value::array([1]), TypeTag::ArrayNumbers)
		.build();
	let model = build(&class);
	for name in model.keys() {
		assert!(model.clear_property(&name).unwrap(), "{} changed on first clear", name);
		let declared = model.declared_type(&name).unwrap();
		assert_eq!(model.get(&name).unwrap().to_json(), declared.default_value().to_json());
		assert!(!model.clear_property(&name).unwrap(), "{} changed on second clear", name);
	}
	assert!(!model.clear(Flags::empty()).unwrap());
}

#[test]
fn clear_resets_every_property() {
	let class = ModelClass::builder("Cleared")
		.default("n", 7)
		.default("s", "text")
		.default("list", Value::array([1]))
		.build();
	let model = build(&class);
	assert!(model.clear(Flags::empty()).unwrap());
	assert_eq!(model.get("n").unwrap(), Value::from(0));
	assert_eq!(model.get("s").unwrap(), Value::from(""));
	assert_eq!(model.size("list").unwrap(), 0);
	assert!(!model.clear(Flags::empty()).unwrap());
}

#[test]
fn nested_instances_are_destroyed_once() {
	let registry = Registry::new();
	let parent_class = ModelClass::builder("Parent").typed("child", Value::Null, TypeTag::Model).build();
	let child_class = ModelClass::builder("Child").default("n", 1).build();

	let destroyed = Rc::new(Cell::new(0));
	let child = Model::builder(&child_class).registry(registry.clone()).build().unwrap();
	{
		let destroyed = Rc::clone(&destroyed);
		child.on_destroy(move |_| destroyed.set(destroyed.get() + 1));
	}
	let parent = Model::builder(&parent_class).registry(registry.clone()).build().unwrap();
	parent.set("child", child.clone()).unwrap();
	assert!(parent.delete("child", Flags::empty()).unwrap());
	assert_eq!(destroyed.get(), 1);
	assert!(child.is_destroyed());
	assert!(registry.lookup(child.uuid()).is_none());
	child.destroy();
	assert_eq!(destroyed.get(), 1);

	let survivor = Model::builder(&child_class).registry(registry.clone()).build().unwrap();
	parent.set("child", survivor.clone()).unwrap();
	assert!(parent.delete("child", Flags::NO_DESTROY).unwrap());
	assert!(!survivor.is_destroyed());
	assert!(!parent.delete("child", Flags::empty()).unwrap());

	// Replacing releases the previous instance too.
	parent.set("child", survivor.clone()).unwrap();
	let replacement = Model::builder(&child_class).registry(registry.clone()).build().unwrap();
	parent.set("child", replacement.clone()).unwrap();
	assert!(survivor.is_destroyed());

	parent.destroy();
	assert!(replacement.is_destroyed());
	assert!(registry.is_empty());
}

#[test]
fn array_model_removal_destroys_items() {
	let registry = Registry::new();
	let item_class = ModelClass::builder("Item").default("id", 0).build();
	let list_class = ModelClass::builder("Items").typed("items", Vec::<Value>::new(), TypeTag::ArrayModel).build();
	let list = Model::builder(&list_class).registry(registry.clone()).build().unwrap();
	let items: Vec<Model> = (1..=3)
		.map(|id| Model::builder(&item_class).registry(registry.clone()).property("id", id).build().unwrap())
		.collect();
	for item in &items {
		list.add_to("items", item.clone(), None, Flags::empty()).unwrap();
	}
	assert!(matches!(list.add_to("items", 4, None, Flags::empty()), Err(Error::TypeMismatch { .. })));

	assert!(list.remove_from("items", 2_i64, Flags::empty()).unwrap());
	assert!(items[1].is_destroyed());
	assert!(list.remove_from("items", 0_usize, Flags::NO_DESTROY).unwrap());
	assert!(!items[0].is_destroyed());
	assert_eq!(list.size("items").unwrap(), 1);
	assert_eq!(list.get_data()["items"], json!([{ "id": 3 }]));
}

#[test]
fn late_subscribers_catch_up() {
	let class = ModelClass::builder("Late").default("n", 0).default("m", 0).build();
	let model = build(&class);
	model.set("n", 5).unwrap();
	assert_eq!(model.deferred_properties(), ["n"]);

	let seen = Rc::new(RefCell::new(Vec::new()));
	{
		let seen = Rc::clone(&seen);
		model
			.on(
				["n", "m"],
				callback(move |_, notification| seen.borrow_mut().push((notification.name.to_owned(), notification.current.clone()))),
			)
			.unwrap();
	}
	assert_eq!(*seen.borrow(), [("n".to_owned(), Value::from(5))]);

	scheduler::flush();
	assert!(model.is_initialized());
	assert!(model.deferred_properties().is_empty());

	let after = Rc::new(Cell::new(0));
	{
		let after = Rc::clone(&after);
		model.on("n", callback(move |_, _| after.set(after.get() + 1))).unwrap();
	}
	assert_eq!(after.get(), 0);
	model.on_with("n", callback(|_, _| {}), OnOptions::immediately()).unwrap();
}

#[test]
fn subscriptions() {
	let class = ModelClass::builder("Subscribed").default("n", 0).build();
	let model = build(&class);
	scheduler::flush();

	let seen = Rc::new(RefCell::new(Vec::new()));
	let record = {
		let seen = Rc::clone(&seen);
		callback(move |_, notification| {
			let context = notification.context.and_then(|context| context.downcast_ref::<&str>()).copied();
			seen.borrow_mut().push((
				notification.value.clone(),
				notification.previous.cloned(),
				context.map(ToOwned::to_owned),
			));
		})
	};
	model
		.on_with("n", Rc::clone(&record), OnOptions::default().with_aux("aux").with_context(Rc::new("context")))
		.unwrap();
	model.set("n", 1).unwrap();
	model.set_with("n", 2, Flags::NO_CALLBACKS).unwrap();
	model.trigger("n").unwrap();
	assert_eq!(
		*seen.borrow(),
		[
			(Value::from("aux"), Some(Value::from(0)), Some("context".to_owned())),
			(Value::from("aux"), None, Some("context".to_owned())),
		]
	);

	assert_eq!(model.off(Some("n"), Some(&record)), 1);
	assert_eq!(model.off(None, None), 0);
	assert!(matches!(model.on("missing", record), Err(Error::UndeclaredProperty { .. })));
}

#[test]
fn storage_merge_priority() {
	init_logging();
	let store = Rc::new(MemoryStore::new());
	store.set_item("prefs:u1", r#"{"a": 2, "b": 2, "junk": 1}"#).unwrap();

	let class = ModelClass::builder("Prefs")
		.default("a", 1)
		.default("b", 1)
		.default("c", 1)
		.default("_scratch", "")
		.local_storage("prefs")
		.auto_save()
		.build();
	let model = Model::builder(&class)
		.registry(Registry::new())
		.storage(store.clone())
		.uuid("u1")
		.property("b", 3)
		.build()
		.unwrap();
	assert_eq!(model.get_data(), json!({ "a": 2, "b": 3, "c": 1, "_scratch": "" }));
	assert_eq!(model.keys(), ["a", "b", "c", "_scratch"]);

	model.set("c", 4).unwrap();
	model.set_with("_scratch", "x", Flags::NO_SAVE).unwrap();
	let saved: serde_json::Value = serde_json::from_str(&store.get_item("prefs:u1").unwrap()).unwrap();
	assert_eq!(saved, json!({ "a": 2, "b": 3, "c": 4 }));

	let meta = model.to_json(true);
	assert_eq!(meta["__class"], "Prefs");
	assert_eq!(meta["__uuid"], "u1");
	assert_eq!(meta["__version"], serde_json::Value::Null);
}

#[test]
fn complex_values_survive_a_reload() {
	init_logging();
	let store = Rc::new(MemoryStore::new());
	let registry = Registry::new();
	let child_class = ModelClass::builder("Leaf").default("v", 1).build();
	let class = ModelClass::builder("Shapes")
		.typed("tags", Value::set::<Value>([]), TypeTag::Set)
		.typed("lookup", Value::map::<Value, Value>([]), TypeTag::Map)
		.default("point", Value::xy(0.0, 0.0))
		.typed("child", Value::Null, TypeTag::Model)
		.local_storage("shapes")
		.singleton()
		.build();
	let load = || {
		Model::builder(&class)
			.registry(registry.clone())
			.storage(store.clone())
			.build()
			.unwrap()
	};

	let model = load();
	model.set("tags", Value::set(["a", "b"])).unwrap();
	model.set("lookup", Value::map([("k", 1)])).unwrap();
	model.set("point", Value::xy(1.0, 2.0)).unwrap();
	model.set("child", Model::builder(&child_class).registry(registry.clone()).build().unwrap()).unwrap();
	model.save().unwrap();
	let saved: serde_json::Value = serde_json::from_str(&store.get_item("shapes").unwrap()).unwrap();
	assert_eq!(saved, json!({ "tags": ["a", "b"], "lookup": [["k", 1]], "point": { "x": 1.0, "y": 2.0 } }));
	model.destroy();

	let restored = load();
	assert_eq!(restored.get_data(), json!({ "tags": ["a", "b"], "lookup": [["k", 1]], "point": { "x": 1.0, "y": 2.0 }, "child": null }));
	assert_eq!(restored.declared_type("tags"), Some(TypeTag::Set));
	restored.destroy();

	// Payloads written before nested instances were excluded still load.
	store.set_item("shapes", r#"{"child": {"v": 1}, "point": {"x": 3, "y": 4}}"#).unwrap();
	let legacy = load();
	assert_eq!(legacy.get("child").unwrap(), Value::Null);
	assert_eq!(legacy.get("point").unwrap(), Value::xy(3.0, 4.0));
}

#[test]
fn save_without_storage() {
	let class = ModelClass::builder("Volatile").default("n", 1).build();
	let model = build(&class);
	assert_eq!(model.storage_key(), None);
	assert!(matches!(model.save(), Err(Error::NoStorage { .. })));
}

#[test]
fn construction_errors() {
	let registry = Registry::new();
	let singleton = ModelClass::builder("Settings").singleton().build();
	let first = Model::builder(&singleton).registry(registry.clone()).build().unwrap();
	assert!(matches!(
		Model::builder(&singleton).registry(registry.clone()).build(),
		Err(Error::DuplicateSingleton { .. })
	));
	assert!(registry.singleton("Settings").is_some_and(|found| found.ptr_eq(&first)));
	first.destroy();
	Model::builder(&singleton).registry(registry.clone()).build().unwrap();

	let plain = ModelClass::builder("Plain").build();
	Model::builder(&plain).registry(registry.clone()).uuid("same").build().unwrap();
	assert!(matches!(
		Model::builder(&plain).registry(registry.clone()).uuid("same").build(),
		Err(Error::DuplicateUuid { .. })
	));
	assert!(matches!(
		Model::builder(&plain).registry(registry.clone()).typed_property("shape", Value::Null, TypeTag::Object).build(),
		Err(Error::MissingShape { .. })
	));

	let inferred = Model::builder(&plain).registry(registry.clone()).property("extra", "x").build().unwrap();
	assert_eq!(inferred.declared_type("extra"), Some(TypeTag::String));
	assert_eq!(registry.instances_of("Plain").len(), 2);
}

#[test]
fn destroyed_instances_refuse_work() {
	let class = ModelClass::builder("Gone")
		.default("n", 1)
		.method("twice", |model, _| Value::from(model.get("n").ok().and_then(|n| n.as_number()).unwrap_or_default() * 2.0))
		.build();
	let model = build(&class);
	assert_eq!(model.call("twice", &[]).unwrap(), Value::from(2));
	model.destroy();
	model.destroy();
	assert!(matches!(model.get("n"), Err(Error::Destroyed { .. })));
	assert!(matches!(model.set("n", 2), Err(Error::Destroyed { .. })));
	assert!(matches!(model.call("twice", &[]), Err(Error::Destroyed { .. })));
	assert_eq!(model.get_data(), json!({}));
}

#[test]
fn implicit_properties_and_initializer() {
	let class = ModelClass::builder("Loose")
		.implicit_properties()
		.initialize(|model| model.set("ready", true).map(drop))
		.build();
	let model = build(&class);
	assert_eq!(model.get("anything").unwrap(), Value::Null);
	model.set("count", 3).unwrap();
	assert_eq!(model.declared_type("count"), Some(TypeTag::Number));
	assert!(!model.is_initialized());
	scheduler::flush();
	assert!(model.is_initialized());
	assert_eq!(model.get("ready").unwrap(), Value::from(true));

	let failing = ModelClass::builder("Failing").initialize(|_| Err(Error::Storage("offline".to_owned()))).build();
	let model = build(&failing);
	scheduler::flush();
	assert!(!model.is_initialized());
	assert_eq!(model.init_error(), Some(Error::Storage("offline".to_owned())));
	assert!(matches!(model.get("anything"), Err(Error::UndeclaredProperty { .. })));
}
