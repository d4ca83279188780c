use proptest::prelude::*;

use pad::config::Config;
use pad::kit::Kit;
use pad::lang::{lexer, methods, parser, Value};

fn kit() -> Kit {
    Kit::new(Config::with_app_dir("/nonexistent/.pad"))
}

proptest! {
    /// The lexer and parser report errors; they never panic.
    #[test]
    fn parser_does_not_panic(s in "\\PC*") {
        let _ = lexer::tokenize(&s);
        let _ = parser::parse(&s);
    }

    /// Same, but biased towards block delimiters and keywords.
    #[test]
    fn parser_does_not_panic_on_blocky_input(
        parts in prop::collection::vec(
            prop_oneof![
                Just("{@"), Just("@}"), Just("{:"), Just(":}"), Just("def "), Just("end"),
                Just("if "), Just("for "), Just(":"), Just("("), Just(")"), Just("["),
                Just("]"), Just("\""), Just("1.5"), Just("x"), Just("\n"), Just(" "),
            ],
            0..40,
        )
    ) {
        let src: String = parts.concat();
        let _ = parser::parse(&src);
    }
}

proptest! {
    /// Text with no block openers renders byte for byte.
    #[test]
    fn text_without_blocks_is_verbatim(s in "[^{]*") {
        let mut k = kit();
        prop_assert!(k.compile_from_str(&s).is_ok());
        prop_assert_eq!(k.stdout_buf(), s.as_str());
    }
}

proptest! {
    /// Integer arithmetic wraps like `i64`.
    #[test]
    fn int_arithmetic_agrees_with_i64(a in any::<i64>(), b in any::<i64>()) {
        let mut k = kit();
        k.context_mut().set_var("a", Value::from(a));
        k.context_mut().set_var("b", Value::from(b));
        k.compile_from_str("{: a + b :},{: a - b :},{: a * b :}").unwrap();
        let expected = format!("{},{},{}", a.wrapping_add(b), a.wrapping_sub(b), a.wrapping_mul(b));
        prop_assert_eq!(k.stdout_buf(), expected.as_str());
    }

    #[test]
    fn int_division_agrees_with_i64(a in any::<i64>(), b in any::<i64>().prop_filter("non-zero", |b| *b != 0)) {
        let mut k = kit();
        k.context_mut().set_var("a", Value::from(a));
        k.context_mut().set_var("b", Value::from(b));
        k.compile_from_str("{: a / b :},{: a % b :}").unwrap();
        let expected = format!("{},{}", a.wrapping_div(b), a.wrapping_rem(b));
        prop_assert_eq!(k.stdout_buf(), expected.as_str());
    }
}

proptest! {
    /// `snake` output never contains uppercase ASCII.
    #[test]
    fn snake_has_no_uppercase(s in "[A-Za-z_]{0,24}") {
        let out = methods::snake(&s);
        prop_assert!(!out.chars().any(|c| c.is_ascii_uppercase()));
    }
}
