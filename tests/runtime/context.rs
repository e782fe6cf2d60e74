//! Context API used directly and from step functions

use super::{drain, finished, init, thrown, yielded};
use stepgen::{
    CheapClone, Completion, Context, Coroutine, CoroutineOptions, Loc, RegionSpec, Step, Value,
};

#[test]
fn test_stop_repeats_return_value() {
    init();
    let mut cx = Context::new(&[]);
    cx.abrupt_return(Value::from("r")).unwrap();
    assert_eq!(cx.next_loc(), Loc::End);
    for _ in 0..3 {
        assert_eq!(cx.stop().unwrap(), Value::from("r"));
    }
    assert!(cx.is_done());
}

#[test]
fn test_stop_repeats_escaped_error() {
    init();
    let mut cx = Context::new(&[RegionSpec::try_finally(0, 3)]);
    cx.set_prev(4);
    let error = Value::object([("code", Value::from(1))]);
    assert!(!cx.dispatch_exception(error.cheap_clone()).unwrap());
    for _ in 0..3 {
        assert_eq!(thrown(cx.stop().unwrap_err()), error);
    }
}

#[test]
fn test_reset_restores_initial_state() {
    init();
    let mut cx = Context::new(&[RegionSpec::try_catch(0, 4)]);
    cx.set("result", Value::from(1));
    cx.set_prev(1);
    cx.dispatch_exception(Value::from("pending")).unwrap();
    cx.abrupt_return(Value::from(2)).unwrap();
    cx.stop().unwrap();

    cx.reset();
    assert!(!cx.is_done());
    assert_eq!(cx.prev(), Loc::START);
    assert_eq!(cx.next_loc(), Loc::START);
    assert_eq!(cx.get("result"), &Value::Undefined);
    assert_eq!(cx.get("t0"), &Value::Null);
    assert_eq!(cx.return_value(), &Value::Undefined);
    // The pending exception is gone with the rest
    assert!(cx.catch(0).is_err());
}

#[test]
fn test_complete_applies_record_directly() {
    init();
    let mut cx = Context::new(&[RegionSpec::try_finally(0, 6)]);
    cx.set_prev(2);
    // Unlike abrupt, complete ignores the enclosing finally
    assert_eq!(cx.complete(Completion::Break(Loc::At(9))).unwrap(), Step::Continue);
    assert_eq!(cx.next_loc(), Loc::At(9));
    assert_eq!(cx.complete(Completion::Normal).unwrap(), Step::Continue);
    assert_eq!(cx.next_loc(), Loc::At(9));
    assert!(cx.complete(Completion::Throw(Value::Null)).is_err());
}

#[test]
fn test_temp_slot_count_follows_options() {
    init();
    let co = Coroutine::builder(|cx: &mut Context| match cx.advance() {
        Loc::At(0) => {
            let slots = Value::array([cx.get("t1").clone(), cx.get("t2").clone()]);
            Ok(cx.suspend(1, slots))
        }
        _ => cx.stop().map(Step::Value),
    })
    .options(CoroutineOptions {
        temp_slots: 2,
        ..CoroutineOptions::default()
    })
    .build();
    let first = drain(&co).into_iter().next().unwrap();
    assert_eq!(first.value.to_string(), ",");
    let Value::Array(items) = first.value else {
        panic!("expected an array");
    };
    assert_eq!(*items.borrow(), vec![Value::Null, Value::Undefined]);
}

#[test]
fn test_for_in_over_object_skips_deleted_keys() {
    init();
    // for (const k in obj) { delete obj.b; yield k }
    let object = Value::object([
        ("a", Value::from(1)),
        ("b", Value::from(2)),
        ("c", Value::from(3)),
    ]);
    let source = object.cheap_clone();
    let mut keys = None;
    let co = stepgen::wrap(
        move |cx: &mut Context| match cx.advance() {
            Loc::At(0) => {
                keys = Some(Context::keys(&source));
                cx.goto(1);
                Ok(Step::Continue)
            }
            Loc::At(1) => match keys.as_mut().and_then(|keys| keys.next()) {
                Some(key) => {
                    if let Value::Object(props) = &source {
                        props.borrow_mut().shift_remove("b");
                    }
                    Ok(cx.suspend(1, Value::from(key)))
                }
                None => {
                    cx.goto(5);
                    Ok(Step::Continue)
                }
            },
            _ => cx.stop().map(Step::Value),
        },
        &[],
    );
    assert_eq!(
        drain(&co),
        vec![yielded("a"), yielded("c"), finished(Value::Undefined)]
    );
}
