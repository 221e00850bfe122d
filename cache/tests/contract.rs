//! Cross-backend contract tests.
//!
//! Every backend must expose identical observable data-model semantics, so
//! each scenario here runs against all four engines.

use std::thread;
use std::time::Duration;

use hoard_cache::{Cache, Error, HashLayout, Store, Ttl};
use hoard_kv::{LogEngine, MemoryEngine, RedbEngine, SledEngine};
use tempfile::TempDir;

struct Backend {
    name: &'static str,
    store: Box<dyn Store>,
    _dir: Option<TempDir>,
}

fn all_backends() -> Vec<Backend> {
    let mut backends = vec![Backend {
        name: "memory",
        store: Box::new(Cache::new(MemoryEngine::new(), HashLayout::Blob)),
        _dir: None,
    }];

    let dir = TempDir::new().unwrap();
    backends.push(Backend {
        name: "transactional-file",
        store: Box::new(Cache::new(
            RedbEngine::open(dir.path().join("cache.redb")).unwrap(),
            HashLayout::Fielded,
        )),
        _dir: Some(dir),
    });

    let dir = TempDir::new().unwrap();
    backends.push(Backend {
        name: "ordered-file",
        store: Box::new(Cache::new(
            SledEngine::open(dir.path().join("cache.sled")).unwrap(),
            HashLayout::Fielded,
        )),
        _dir: Some(dir),
    });

    let dir = TempDir::new().unwrap();
    backends.push(Backend {
        name: "append-log-file",
        store: Box::new(Cache::new(
            LogEngine::open(dir.path().join("cache.log")).unwrap(),
            HashLayout::Fielded,
        )),
        _dir: Some(dir),
    });

    backends
}

fn for_each_backend(test: impl Fn(&dyn Store, &str)) {
    for backend in all_backends() {
        test(backend.store.as_ref(), backend.name);
    }
}

#[test]
fn unwritten_keys_do_not_exist() {
    for_each_backend(|store, name| {
        assert!(
            matches!(store.get("missing"), Err(Error::NotFound)),
            "{name}: get on fresh key"
        );
        assert_eq!(store.ttl("missing").unwrap(), Ttl::Missing, "{name}");
        assert!(!store.exists(&["missing"]).unwrap(), "{name}");
    });
}

#[test]
fn scalar_roundtrip() {
    for_each_backend(|store, name| {
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap(), "v", "{name}");
        assert_eq!(store.ttl("k").unwrap(), Ttl::None, "{name}");
        assert!(store.exists(&["k"]).unwrap(), "{name}");
    });
}

#[test]
fn expiration_is_lazy_and_uniform() {
    for_each_backend(|store, name| {
        let ttl = Duration::from_millis(80);
        store.set_ex("tmp", "v", ttl).unwrap();

        match store.ttl("tmp").unwrap() {
            Ttl::Remaining(d) => assert!(d <= ttl && d > Duration::ZERO, "{name}: ttl {d:?}"),
            other => panic!("{name}: expected Remaining, got {other:?}"),
        }
        assert_eq!(store.get("tmp").unwrap(), "v", "{name}");

        thread::sleep(Duration::from_millis(150));
        assert!(
            matches!(store.get("tmp"), Err(Error::NotFound)),
            "{name}: expired key still readable"
        );
        assert_eq!(store.ttl("tmp").unwrap(), Ttl::Missing, "{name}");
        assert!(!store.exists(&["tmp"]).unwrap(), "{name}");
    });
}

#[test]
fn set_nx_respects_liveness() {
    for_each_backend(|store, name| {
        assert!(store.set_nx("once", "a").unwrap(), "{name}");
        assert!(!store.set_nx("once", "b").unwrap(), "{name}");
        assert_eq!(store.get("once").unwrap(), "a", "{name}");

        // An expired key counts as absent again.
        assert!(
            store
                .set_nx_ex("flash", "a", Duration::from_millis(50))
                .unwrap(),
            "{name}"
        );
        assert!(!store.set_nx("flash", "b").unwrap(), "{name}");
        thread::sleep(Duration::from_millis(100));
        assert!(store.set_nx("flash", "c").unwrap(), "{name}");
        assert_eq!(store.get("flash").unwrap(), "c", "{name}");
    });
}

#[test]
fn expire_arms_only_live_keys() {
    for_each_backend(|store, name| {
        assert!(!store.expire("missing", Duration::from_secs(1)).unwrap(), "{name}");

        store.set("k", "v").unwrap();
        assert!(store.expire("k", Duration::from_millis(60)).unwrap(), "{name}");
        assert!(matches!(store.ttl("k").unwrap(), Ttl::Remaining(_)), "{name}");

        thread::sleep(Duration::from_millis(120));
        assert!(matches!(store.get("k"), Err(Error::NotFound)), "{name}");
    });
}

#[test]
fn counters() {
    for_each_backend(|store, name| {
        assert_eq!(store.incr("c").unwrap(), 1, "{name}: incr on absent key");
        assert_eq!(store.incr_by("c", 10).unwrap(), 11, "{name}");
        assert_eq!(store.decr("c").unwrap(), 10, "{name}");
        assert_eq!(store.decr_by("c", 7).unwrap(), 3, "{name}");

        // Repeated fixed-step increments accumulate exactly.
        for i in 1..=5 {
            assert_eq!(store.incr_by("acc", 4).unwrap(), 4 * i, "{name}");
        }

        // Non-numeric state counts from zero, never errors.
        store.set("c", "garbage").unwrap();
        assert_eq!(store.incr("c").unwrap(), 1, "{name}");
    });
}

#[test]
fn hash_semantics() {
    for_each_backend(|store, name| {
        assert!(store.h_set("h", "f1", "v1").unwrap(), "{name}: first set is new");
        assert!(!store.h_set("h", "f1", "v2").unwrap(), "{name}: overwrite is not");
        assert!(store.h_set("h", "f2", "v").unwrap(), "{name}");
        assert!(store.h_set("h", "f3", "v").unwrap(), "{name}");

        assert_eq!(store.h_get("h", "f1").unwrap(), "v2", "{name}");
        assert!(matches!(store.h_get("h", "nope"), Err(Error::NotFound)), "{name}");
        assert!(store.h_exists("h", "f2").unwrap(), "{name}");

        let all = store.h_get_all("h").unwrap();
        assert_eq!(all.len(), 3, "{name}");
        assert_eq!(all["f1"], "v2", "{name}");

        let mut keys = store.h_keys("h").unwrap();
        keys.sort();
        assert_eq!(keys, ["f1", "f2", "f3"], "{name}");

        assert_eq!(store.h_del("h", &["f1", "missing"]).unwrap(), 1, "{name}");
        assert!(!store.h_exists("h", "f1").unwrap(), "{name}");

        assert_eq!(store.h_incr("h", "hits").unwrap(), 1, "{name}");
        assert_eq!(store.h_incr_by("h", "hits", 5).unwrap(), 6, "{name}");
        assert_eq!(store.h_decr_by("h", "hits", 2).unwrap(), 4, "{name}");
    });
}

#[test]
fn absent_hash_enumerates_empty() {
    for_each_backend(|store, name| {
        assert!(store.h_get_all("nothing").unwrap().is_empty(), "{name}");
        assert!(store.h_keys("nothing").unwrap().is_empty(), "{name}");
        assert_eq!(store.h_del("nothing", &["f"]).unwrap(), 0, "{name}");
    });
}

#[test]
fn set_semantics() {
    for_each_backend(|store, name| {
        // Duplicates within one call and pre-existing members count once.
        assert_eq!(store.s_add("s", &["a", "a", "b"]).unwrap(), 2, "{name}");
        assert_eq!(store.s_add("s", &["b", "c"]).unwrap(), 1, "{name}");

        assert!(store.s_is_member("s", "a").unwrap(), "{name}");
        assert!(!store.s_is_member("s", "z").unwrap(), "{name}");

        let mut members = store.s_members("s").unwrap();
        members.sort();
        assert_eq!(members, ["a", "b", "c"], "{name}");

        assert_eq!(store.s_rem("s", &["a", "z"]).unwrap(), 1, "{name}");
        assert!(!store.s_is_member("s", "a").unwrap(), "{name}");

        let popped = store.s_pop("s").unwrap().unwrap();
        assert!(!store.s_is_member("s", &popped).unwrap(), "{name}: pop removes");
        assert_eq!(store.s_members("s").unwrap().len(), 1, "{name}");
    });
}

#[test]
fn rand_member_count_contract() {
    for_each_backend(|store, name| {
        assert!(store.s_rand_member("empty", 3).unwrap().is_empty(), "{name}");
        assert_eq!(store.s_pop("empty").unwrap(), None, "{name}");

        store.s_add("s", &["a", "b", "c"]).unwrap();

        // count <= 0 returns exactly one member.
        let one = store.s_rand_member("s", 0).unwrap();
        assert_eq!(one.len(), 1, "{name}");
        assert!(store.s_is_member("s", &one[0]).unwrap(), "{name}");
        assert_eq!(store.s_rand_member("s", -5).unwrap().len(), 1, "{name}");

        // count >= size returns the whole set, order unspecified.
        let mut whole = store.s_rand_member("s", 100).unwrap();
        whole.sort();
        assert_eq!(whole, ["a", "b", "c"], "{name}");

        assert_eq!(store.s_rand_member("s", 2).unwrap().len(), 2, "{name}");
    });
}

#[test]
fn scalar_hash_and_set_namespaces_are_independent() {
    for_each_backend(|store, name| {
        store.set("k", "scalar").unwrap();
        store.h_set("k", "f", "hash").unwrap();
        store.s_add("k", &["member"]).unwrap();

        assert_eq!(store.get("k").unwrap(), "scalar", "{name}");
        assert_eq!(store.h_get("k", "f").unwrap(), "hash", "{name}");
        assert!(store.s_is_member("k", "member").unwrap(), "{name}");
    });
}

#[test]
fn del_removes_all_shapes_and_is_idempotent() {
    for_each_backend(|store, name| {
        store.set("k", "scalar").unwrap();
        store.h_set("k", "f", "hash").unwrap();
        store.s_add("k", &["m"]).unwrap();
        store.set("other", "kept").unwrap();

        store.del(&["k"]).unwrap();
        assert!(matches!(store.get("k"), Err(Error::NotFound)), "{name}");
        assert!(store.h_get_all("k").unwrap().is_empty(), "{name}");
        assert!(store.s_members("k").unwrap().is_empty(), "{name}");
        assert_eq!(store.get("other").unwrap(), "kept", "{name}");

        // Deleting what is already gone is fine.
        store.del(&["k", "never-written"]).unwrap();
    });
}

#[test]
fn clean_wipes_the_namespace() {
    for_each_backend(|store, name| {
        store.set("a", "1").unwrap();
        store.h_set("b", "f", "v").unwrap();
        store.s_add("c", &["m"]).unwrap();

        store.clean().unwrap();
        assert!(matches!(store.get("a"), Err(Error::NotFound)), "{name}");
        assert!(store.h_get_all("b").unwrap().is_empty(), "{name}");
        assert!(store.s_members("c").unwrap().is_empty(), "{name}");
    });
}

#[test]
fn operations_after_close_fail_cleanly() {
    for backend in all_backends() {
        let name = backend.name;
        let store = backend.store;
        store.set("k", "v").unwrap();
        store.close().unwrap();

        assert!(
            matches!(store.get("k"), Err(Error::Engine(_))),
            "{name}: get after close"
        );
        assert!(
            matches!(store.set("k", "v"), Err(Error::Engine(_))),
            "{name}: set after close"
        );
        assert!(
            matches!(store.s_add("s", &["m"]), Err(Error::Engine(_))),
            "{name}: s_add after close"
        );
    }
}
