//! try/catch/finally routing through protected regions

use super::{drain, finished, init, next, thrown, yielded};
use std::cell::RefCell;
use std::rc::Rc;
use stepgen::{Context, Coroutine, Loc, RegionSpec, RuntimeError, Step, Value};

type Log = Rc<RefCell<Vec<String>>>;

fn log_entry(log: &Log, entry: impl Into<String>) {
    log.borrow_mut().push(entry.into());
}

/// ```text
/// try {                       // 0
///     try {                   // 1
///         yield "in-inner";
///     } finally {             // 5
///         log("inner-finally");
///     }
/// } catch (e) {               // 10
///     log("outer-catch");
///     yield e;
/// } finally {                 // 15
///     log("outer-finally");
/// }
/// return "after";             // 20
/// ```
fn nested(log: Log) -> Coroutine {
    Coroutine::builder(move |cx: &mut Context| match cx.advance() {
        Loc::At(0) => {
            cx.goto(1);
            Ok(Step::Continue)
        }
        Loc::At(1) => Ok(cx.suspend(3, Value::from("in-inner"))),
        Loc::At(3) => {
            cx.goto(5);
            Ok(Step::Continue)
        }
        Loc::At(5) => {
            log_entry(&log, "inner-finally");
            cx.goto(8);
            cx.finish(5)
        }
        Loc::At(8) => {
            cx.goto(15);
            Ok(Step::Continue)
        }
        Loc::At(10) => {
            let e = cx.catch(0)?;
            log_entry(&log, format!("outer-catch:{}", e));
            Ok(cx.suspend(12, e))
        }
        Loc::At(12) => {
            cx.goto(15);
            Ok(Step::Continue)
        }
        Loc::At(15) => {
            log_entry(&log, "outer-finally");
            cx.goto(20);
            cx.finish(15)
        }
        Loc::At(20) => cx.abrupt_return(Value::from("after")),
        _ => cx.stop().map(Step::Value),
    })
    .regions([
        RegionSpec::try_catch_finally(0, 10, 15),
        RegionSpec::try_finally(1, 5),
    ])
    .build()
}

#[test]
fn test_injected_error_runs_inner_finally_then_outer_catch() {
    init();
    let log: Log = Rc::default();
    let co = nested(Rc::clone(&log));

    assert_eq!(next(&co), yielded("in-inner"));
    let error = Value::object([("message", Value::from("E"))]);
    let caught = co.resume_with_error(error.clone()).unwrap();
    // The catch block received the very same payload
    assert_eq!(caught, yielded(error));
    assert_eq!(next(&co), finished("after"));
    assert_eq!(
        *log.borrow(),
        vec!["inner-finally", "outer-catch:[object Object]", "outer-finally"]
    );
}

#[test]
fn test_normal_path_runs_both_finally_blocks() {
    init();
    let log: Log = Rc::default();
    let co = nested(Rc::clone(&log));
    assert_eq!(drain(&co), vec![yielded("in-inner"), finished("after")]);
    assert_eq!(*log.borrow(), vec!["inner-finally", "outer-finally"]);
}

#[test]
fn test_injected_error_runs_every_step_of_a_finally_block() {
    init();
    let log: Log = Rc::default();
    let finally_log = Rc::clone(&log);
    // try { try { yield 1 } finally { log("A"); ...; log("B") } } catch (e) { return e }
    let co = stepgen::wrap(
        move |cx: &mut Context| match cx.advance() {
            Loc::At(0) => {
                cx.goto(1);
                Ok(Step::Continue)
            }
            Loc::At(1) => Ok(cx.suspend(3, Value::from(1))),
            Loc::At(3) => {
                cx.goto(4);
                Ok(Step::Continue)
            }
            Loc::At(4) => {
                log_entry(&finally_log, "A");
                cx.goto(5);
                Ok(Step::Continue)
            }
            Loc::At(5) => {
                log_entry(&finally_log, "B");
                cx.goto(8);
                cx.finish(4)
            }
            Loc::At(8) => {
                cx.goto(12);
                Ok(Step::Continue)
            }
            Loc::At(10) => {
                let e = cx.catch(0)?;
                cx.abrupt_return(e)
            }
            Loc::At(12) => cx.abrupt_return(Value::from("normal")),
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_catch(0, 10), RegionSpec::try_finally(1, 4)],
    );

    assert_eq!(next(&co), yielded(1));
    assert_eq!(co.resume_with_error(Value::from("E")).unwrap(), finished("E"));
    assert_eq!(*log.borrow(), vec!["A", "B"]);
}

#[test]
fn test_return_in_finally_discards_injected_error() {
    init();
    // try { yield 1 } finally { return "override" }
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Ok(cx.suspend(2, Value::from(1))),
            Loc::At(2) => {
                cx.goto(4);
                Ok(Step::Continue)
            }
            Loc::At(4) => cx.abrupt_return(Value::from("override")),
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_finally(0, 4)],
    );

    next(&co);
    assert_eq!(
        co.resume_with_error(Value::from("E")).unwrap(),
        finished("override")
    );
    assert!(matches!(
        co.resume(Value::Undefined),
        Err(RuntimeError::InvalidState { .. })
    ));
}

#[test]
fn test_break_in_finally_discards_injected_error() {
    init();
    // while (true) { try { yield 1 } finally { break } } yield "after loop"
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Ok(cx.suspend(2, Value::from(1))),
            Loc::At(2) => {
                cx.goto(4);
                Ok(Step::Continue)
            }
            Loc::At(4) => cx.abrupt_break(9),
            Loc::At(9) => Ok(cx.suspend(10, Value::from("after loop"))),
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_finally(0, 4)],
    );

    next(&co);
    assert_eq!(
        co.resume_with_error(Value::from("E")).unwrap(),
        yielded("after loop")
    );
    assert_eq!(next(&co), finished(Value::Undefined));
}

#[test]
fn test_uncaught_injected_error_is_returned_after_finally() {
    init();
    let log: Log = Rc::default();
    let finally_log = Rc::clone(&log);
    // try { yield 1 } finally { log("cleanup") }
    let co = stepgen::wrap(
        move |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Ok(cx.suspend(2, Value::from(1))),
            Loc::At(2) => {
                cx.goto(4);
                Ok(Step::Continue)
            }
            Loc::At(4) => {
                log_entry(&finally_log, "cleanup");
                cx.goto(6);
                cx.finish(4)
            }
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_finally(0, 4)],
    );

    next(&co);
    let err = co.resume_with_error(Value::from("E")).unwrap_err();
    assert_eq!(thrown(err), Value::from("E"));
    assert_eq!(*log.borrow(), vec!["cleanup"]);
    assert!(matches!(
        co.resume(Value::Undefined),
        Err(RuntimeError::InvalidState { .. })
    ));
}

#[test]
fn test_raise_inside_body_is_caught() {
    init();
    // try { throw "bad" } catch (e) { yield e }
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Err(RuntimeError::thrown("bad")),
            Loc::At(3) => {
                let e = cx.catch(0)?;
                Ok(cx.suspend(4, e))
            }
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_catch(0, 3)],
    );
    assert_eq!(next(&co), yielded("bad"));
    assert_eq!(next(&co), finished(Value::Undefined));
}

#[test]
fn test_uncaught_raise_escapes_resume() {
    init();
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Err(RuntimeError::thrown(7)),
            _ => cx.stop().map(Step::Value),
        },
        &[],
    );
    let err = co.resume(Value::Undefined).unwrap_err();
    assert_eq!(err.to_string(), "Uncaught 7");
    assert_eq!(thrown(err), Value::from(7));
}

#[test]
fn test_rethrow_from_catch_reaches_outer_catch() {
    init();
    // try { try { throw 1 } catch (e) { throw e + 1 } } catch (e) { return e }
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => {
                cx.goto(1);
                Ok(Step::Continue)
            }
            Loc::At(1) => Err(RuntimeError::thrown(1)),
            Loc::At(3) => {
                let e = cx.catch(1)?.as_number().unwrap_or(0.0);
                Err(RuntimeError::thrown(e + 1.0))
            }
            Loc::At(6) => {
                let e = cx.catch(0)?;
                cx.abrupt_return(e)
            }
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_catch(0, 6), RegionSpec::try_catch(1, 3)],
    );
    assert_eq!(next(&co), finished(2));
}

#[test]
fn test_return_inside_try_runs_finally_first() {
    init();
    // try { yield 1; return "r" } finally { yield "cleanup" }
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Ok(cx.suspend(2, Value::from(1))),
            Loc::At(2) => cx.abrupt_return(Value::from("r")),
            Loc::At(4) => Ok(cx.suspend(5, Value::from("cleanup"))),
            Loc::At(5) => {
                cx.goto(7);
                cx.finish(4)
            }
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::try_finally(0, 4)],
    );
    assert_eq!(
        drain(&co),
        vec![yielded(1), yielded("cleanup"), finished("r")]
    );
}

#[test]
fn test_continue_through_finally_replays_once() {
    init();
    let log: Log = Rc::default();
    let finally_log = Rc::clone(&log);
    // for (let i = 0; i < 3; i++) { try { if (i == 1) continue; yield i } finally { log() } }
    let co = stepgen::wrap(
        move |cx: &mut Context| {
            let i = cx.get("i").as_number().unwrap_or(0.0);
            match cx.advance() {
                Loc::At(0) => {
                    cx.set("i", Value::from(0));
                    cx.goto(1);
                    Ok(Step::Continue)
                }
                Loc::At(1) => {
                    cx.goto(if i < 3.0 { 2 } else { 10 });
                    Ok(Step::Continue)
                }
                Loc::At(2) => {
                    if i == 1.0 {
                        return cx.abrupt_continue(8);
                    }
                    Ok(cx.suspend(4, Value::from(i)))
                }
                Loc::At(4) => {
                    cx.goto(6);
                    Ok(Step::Continue)
                }
                Loc::At(6) => {
                    log_entry(&finally_log, format!("finally:{}", i));
                    cx.goto(8);
                    cx.finish(6)
                }
                Loc::At(8) => {
                    cx.set("i", Value::from(i + 1.0));
                    cx.goto(1);
                    Ok(Step::Continue)
                }
                _ => cx.stop().map(Step::Value),
            }
        },
        &[RegionSpec::try_finally(2, 6)],
    );
    assert_eq!(
        drain(&co),
        vec![yielded(0), yielded(2), finished(Value::Undefined)]
    );
    assert_eq!(*log.borrow(), vec!["finally:0", "finally:1", "finally:2"]);
}

#[test]
fn test_region_without_handlers_is_malformed() {
    init();
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Err(RuntimeError::thrown("x")),
            _ => cx.stop().map(Step::Value),
        },
        &[RegionSpec::new(0, None, None)],
    );
    let err = co.resume(Value::Undefined).unwrap_err();
    assert!(matches!(err, RuntimeError::MalformedRegion { try_loc: Loc::At(0) }));
}

#[test]
fn test_regions_loaded_from_json() {
    init();
    let regions = RegionSpec::list_from_json("[[0, 3]]").unwrap();
    let co = stepgen::wrap(
        |cx: &mut Context| match cx.advance() {
            Loc::At(0) => Ok(cx.suspend(1, Value::from("waiting"))),
            Loc::At(3) => {
                let e = cx.catch(0)?;
                cx.abrupt_return(e)
            }
            _ => cx.stop().map(Step::Value),
        },
        &regions,
    );
    next(&co);
    assert_eq!(co.resume_with_error(Value::from("e")).unwrap(), finished("e"));
}
