//! Property-based tests for verdict-query using proptest.

use proptest::prelude::*;
use verdict_core::{ErrorKind, Value};
use verdict_query::{compile, Session};

fn ident() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["temp", "room", "state", "zone_2", "Level", "_id"]).prop_map(String::from)
}

fn literal() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<i32>().prop_map(|v| v.to_string()),
        (i32::MAX as u32 + 1..=u32::MAX).prop_map(|v| v.to_string()),
        "[a-z' ]{0,8}".prop_map(|s| format!("'{}'", s.replace('\'', "''"))),
        prop::collection::vec(any::<u8>(), 0..4).prop_map(|b| {
            let hex: String = b.iter().map(|x| format!("{:02X}", x)).collect();
            format!("x'{}'", hex)
        }),
        prop::sample::select(vec!["%s", "%d", "%u", "%b"]).prop_map(String::from),
    ]
}

fn comparison() -> impl Strategy<Value = String> {
    (
        ident(),
        prop::sample::select(vec!["=", "!=", "<", "<=", ">", ">="]),
        literal(),
    )
        .prop_map(|(c, op, v)| format!("{} {} {}", c, op, v))
}

fn condition() -> impl Strategy<Value = String> {
    comparison().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (inner.clone(), prop::sample::select(vec!["&", "|", "and", "OR"]), inner.clone())
                .prop_map(|(a, op, b)| format!("{} {} {}", a, op, b)),
            inner.clone().prop_map(|c| format!("NOT {}", c)),
            inner.clone().prop_map(|c| format!("!({})", c)),
            inner.prop_map(|c| format!("({})", c)),
        ]
    })
}

fn statement_text() -> impl Strategy<Value = String> {
    prop_oneof![
        (ident(), prop::option::of(condition()), prop::option::of((0usize..50, 0usize..5))).prop_map(
            |(t, w, l)| {
                let mut s = format!("select * from {}", t);
                if let Some(w) = w {
                    s.push_str(&format!(" where {}", w));
                }
                if let Some((limit, offset)) = l {
                    s.push_str(&format!(" limit {} offset {}", limit, offset));
                }
                s
            }
        ),
        (ident(), prop::collection::vec(literal(), 1..5)).prop_map(|(t, vs)| {
            format!("insert into {} values ({})", t, vs.join(", "))
        }),
        (ident(), ident(), literal(), prop::option::of(condition())).prop_map(|(t, c, v, w)| {
            match w {
                Some(w) => format!("update {} set {} = {} where {}", t, c, v, w),
                None => format!("update {} set {} = {}", t, c, v),
            }
        }),
        (ident(), prop::option::of(condition()))
            .prop_map(|(t, w)| match w {
                Some(w) => format!("delete from {} where {}", t, w),
                None => format!("delete from {}", t),
            }),
        (ident(), any::<bool>(), prop::collection::vec(ident(), 1..3))
            .prop_map(|(t, u, cs)| format!(
                "create {}index on {} ({})",
                if u { "unique " } else { "" },
                t,
                cs.join(",")
            )),
    ]
}

proptest! {
    /// Printing a compiled statement and compiling the text again gives the same statement.
    #[test]
    fn printed_statement_recompiles(text in statement_text()) {
        let first = compile(&text).unwrap();
        let printed = first.to_string();
        let second = compile(&printed).unwrap();
        prop_assert_eq!(&second, &first);
        prop_assert_eq!(second.to_string(), printed);
    }

    /// Rows inserted through bound parameters read back unchanged.
    #[test]
    fn bound_values_read_back(values in prop::collection::vec((any::<i32>(), "[a-z]{0,8}"), 0..20)) {
        let mut session = Session::default();
        session.run("create table fact (n integer, label varchar(8))").unwrap();
        let mut insert = session.compile("insert into fact values (%d, %s)").unwrap();
        for (n, label) in &values {
            insert.bind(0, verdict_core::DataType::Integer, *n).unwrap();
            insert.bind(1, verdict_core::DataType::Varchar, label.as_str()).unwrap();
            session.execute(&insert, verdict_query::ResultKind::DontCare).unwrap();
        }
        let result = session.run("select * from fact").unwrap();
        let expected: Vec<Vec<Value>> = values
            .iter()
            .map(|(n, l)| vec![Value::Integer(*n), Value::from(l.as_str())])
            .collect();
        prop_assert_eq!(result.rows().unwrap().rows(), expected.as_slice());
    }
}

#[test]
fn named_transactions_release_independently() {
    let mut session = Session::default();
    session.run("create table temp (id integer, state varchar(8))").unwrap();
    session.begin("a").unwrap();
    session.begin("b").unwrap();

    // "b" is nested in "a", so the engine refuses the commit but the name goes.
    let err = session.commit("a").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidHandle);
    assert_eq!(session.transactions().names(), vec!["b".to_string()]);

    session.run("insert into temp values (1, 'cold')").unwrap();
    session.commit("b").unwrap();
    assert!(session.transactions().is_empty());
    assert_eq!(
        session.commit("a").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
