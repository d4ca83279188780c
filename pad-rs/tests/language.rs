//! End-to-end language behaviour through the [`Kit`] facade.

use pad::config::Config;
use pad::kit::Kit;
use pad::lang::ErrorKind;

// ── Helpers ───────────────────────────────────────────────────────────────────

fn kit() -> Kit {
    Kit::new(Config::with_app_dir("/nonexistent/.pad"))
}

fn render(src: &str) -> String {
    let mut k = kit();
    if let Err(e) = k.compile_from_str(src) {
        panic!("compile failed for {src:?}: {e}");
    }
    k.stdout_buf().to_owned()
}

fn fail(src: &str) -> (String, ErrorKind) {
    let mut k = kit();
    match k.compile_from_str(src) {
        Ok(()) => panic!("expected failure for {src:?}"),
        Err(e) => (e.message, e.kind),
    }
}

// ── Templates ─────────────────────────────────────────────────────────────────

#[test]
fn literal_text_is_verbatim() {
    for src in ["", "plain", "line one\nline two\n", "crlf\r\nand cr\rend", "braces { } @ : alone"] {
        assert_eq!(render(src), src);
    }
}

#[test]
fn end_to_end_scenarios() {
    assert_eq!(render("{@ a = 1 + 2 @}{: a :}"), "3");
    assert_eq!(render("{@ def f(): return 1 end @}{: f() :}"), "1");
    assert_eq!(render("{@ for i=0;i<2;i+=1: puts(i) end @}"), "0\n1\n");
}

#[test]
fn newline_after_code_block_is_suppressed() {
    assert_eq!(render("{@ x = 1 @}\nnext"), "next");
    assert_eq!(render("{: 1 :}\nnext"), "1\nnext");
}

#[test]
fn text_inside_function_bodies() {
    let src = "{@ def greet(n): @}Hello {: n :}!{@ end @}{@ greet(\"a\") greet(\"b\") @}";
    assert_eq!(render(src), "Hello a!Hello b!");
}

#[test]
fn loop_over_template_text() {
    let src = "<ul>\n{@ for i = 1; i <= 3; i += 1: @}<li>{: i :}</li>\n{@ end @}</ul>";
    assert_eq!(render(src), "<ul>\n<li>1</li>\n<li>2</li>\n<li>3</li>\n</ul>");
}

#[test]
fn comments_separate_statements() {
    assert_eq!(render("{@ a = 1 // first\nb = 2 /* second */ c = a + b @}{: c :}"), "3");
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

#[test]
fn numeric_promotion() {
    assert_eq!(render("{: 1 + 1.2 :}"), "2.2");
    assert_eq!(render("{: 2 * 2 / 4 % 2 :}"), "1");
    assert_eq!(render("{: true + 1 :}"), "2");
    assert_eq!(render("{: 7 / 2 :}"), "3");
    assert_eq!(render("{: 1.0 * 2 :}"), "2.0");
    assert_eq!(render("{: -3 + 1 :}"), "-2");
    assert_eq!(render("{: \"ab\" * 2 + \"c\" :}"), "ababc");
    assert_eq!(fail("{: 4 / 0 :}").0, "zero division error");
    assert_eq!(fail("{: 4 % false :}").0, "zero division error");
}

#[test]
fn comparisons_are_total_for_equality() {
    assert_eq!(render("{: 1 == 1.0 :},{: \"1\" == 1 :},{: [1, 2] == [1, 2] :},{: nil != 0 :}"), "true,false,true,true");
    assert_eq!(fail("{: \"a\" < 1 :}").0, "can't compare lt string with int");
}

#[test]
fn truthiness() {
    let src = "{@ for v = [nil, 0, 0.0, false, \"\", [], {}, \"x\"]; len(v) > 0; v.pop(): @}{: v[-1] and 1 or 0 :}{@ end @}";
    assert_eq!(render(src), "11100000");
}

// ── Binding laws ──────────────────────────────────────────────────────────────

#[test]
fn alias_law() {
    let src = "{@ a = 1 b = a @}{: id(a) == id(b) :}{@ a += 1 @} {: id(a) == id(b) :} {: b :}";
    assert_eq!(render(src), "true false 1");
}

#[test]
fn reference_law() {
    let src = "{@ a = [] b = a b.push(1) d = {} e = d e[\"k\"] = 2 @}{: a :}{: len(a) :}{: d[\"k\"] :}{: id(d) == id(e) :}";
    assert_eq!(render(src), "(array)12true");
}

#[test]
fn element_round_trip() {
    assert_eq!(render("{@ a = [1, 2] a[0] = a[0] + 1 @}{: a[0] == 2 :} {: len(a) :}"), "true 2");
    assert_eq!(render("{@ a = [[1]] a[0][0] += 5 @}{: a[0][0] :}"), "6");
}

#[test]
fn loop_variable_escapes() {
    assert_eq!(render("{@ for i = 0; i < 4; i += 1: end @}{: i :}"), "4");
}

#[test]
fn undefined_names() {
    assert_eq!(fail("{@ ghost += 1 @}"), ("\"ghost\" is not defined".into(), ErrorKind::Runtime));
    assert_eq!(fail("{: ghost :}").0, "\"ghost\" is not defined in ref block");
}

#[test]
fn trailing_commas_in_literals() {
    assert_eq!(render("{: len([1, 2,]) :}{: len({\"a\": 1,}) :}"), "21");
    assert_eq!(fail("{: [, 1] :}").1, ErrorKind::Parse);
    assert_eq!(fail("{: [1,, 2] :}").1, ErrorKind::Parse);
}

// ── Structs ───────────────────────────────────────────────────────────────────

#[test]
fn struct_defaults_are_copied() {
    let src = "{@
struct Point:
    x = 0
    y = 0
end
a = Point()
b = Point()
a.x = 2
Point.y = 7
c = Point(3, 4, 5)
@}{: a.x :} {: b.x :} {: b.y :} {: c.x :} {: c.y :} {: Point.y :}";
    assert_eq!(render(src), "2 0 0 3 4 7");
}

#[test]
fn bound_and_unbound_members() {
    let src = "{@
struct Box:
    items = []
    met add(self, x):
        self.items.push(x)
        return len(self.items)
    end
    def describe(b): return \"box of \" + String(len(b.items)) end
end
b = Box()
b.add(1)
b.add(2)
@}{: Box.describe(b) :}|{: len(Box().items) :}";
    assert_eq!(render(src), "box of 2|0");
}

#[test]
fn nested_struct_members() {
    let src = "{@ struct Outer: struct Inner: v = 9 end end @}{: Outer.Inner().v :}";
    assert_eq!(render(src), "9");
}

// ── Inheritance ───────────────────────────────────────────────────────────────

#[test]
fn inject_replaces_block_once() {
    let src = "{@
def f():
    block c:
        puts(1)
    end
end
def g() extends f:
    inject c:
        puts(2)
    end
    super()
end
g()
@}";
    assert_eq!(render(src), "2\n");
}

#[test]
fn layout_inheritance_with_text() {
    let src = "{@ def layout(): @}<h1>{@ block title: @}Default{@ end @}</h1>{@ end @}\
{@ def page() extends layout: name = \"Home\" inject title: @}{: name :}{@ end super() end @}\
{@ layout() page() @}";
    assert_eq!(render(src), "<h1>Default</h1><h1>Home</h1>");
}

#[test]
fn three_level_chain() {
    let src = "{@
def base():
    block head: puts(\"base-head\") end
    block body: puts(\"base-body\") end
    block foot: puts(\"base-foot\") end
end
def mid() extends base:
    inject head: puts(\"mid-head\") end
    inject body: puts(\"mid-body\") end
    super()
end
def leaf() extends mid:
    inject body: puts(\"leaf-body\") end
    super()
end
leaf()
@}";
    assert_eq!(render(src), "mid-head\nleaf-body\nbase-foot\n");
}

#[test]
fn inheritance_errors() {
    assert_eq!(fail("{@ inject a: end @}").0, "inject statement needs function");
    assert_eq!(fail("{@ def f(): end def g() extends f: inject zz: end super() end g() @}").0, "not found \"zz\" block");
    assert_eq!(fail("{@ def g() extends nothing: super() end g() @}").0, "can't extends. \"nothing\" is not defined");
    assert_eq!(fail("{@ def g(): super() end g() @}").0, "invalid super call. \"g\" has no extends");
    assert_eq!(fail("{@ g = 1 def h() extends g: super() end h() @}").0, "can't extends. \"g\" is not a function");
    assert_eq!(fail("{@ def h(): return super end h() @}").0, "invalid super usage. super needs call");
}

// ── Control flow and errors ───────────────────────────────────────────────────

#[test]
fn stray_signals() {
    assert_eq!(fail("{@ break @}").0, "invalid break statement. not in loop");
    assert_eq!(fail("{@ continue @}").0, "invalid continue statement. not in loop");
    assert_eq!(fail("{@ return @}").0, "invalid return statement. not in function");
}

#[test]
fn recursion_runs_on_the_test_thread() {
    let src = "{@ def f(n): if n == 0: return 0 end return f(n - 1) end @}{: f(900) :}";
    assert_eq!(render(src), "0");
}

#[test]
fn oversized_string_repeat_is_an_error() {
    let (msg, kind) = fail("{: \"ab\" * 9223372036854775807 :}");
    assert_eq!(msg, "can't mul string. result too large");
    assert_eq!(kind, ErrorKind::Runtime);
}

#[test]
fn self_containing_containers() {
    let src = "{@ a = [] a.push(a) b = [] b.push(b) c = deepcopy(a) @}{: a == b :},{: id(c[0]) == id(c) :},{: id(c) == id(a) :}";
    assert_eq!(render(src), "true,true,false");
}

#[test]
fn exit_stops_the_program() {
    let mut k = kit();
    let err = k.compile_from_str("one{@ if true: exit(7) end @}two").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Exit(7));
    assert_eq!(k.stdout_buf(), "one");
    assert_eq!(k.exit_code(), Some(7));
}

#[test]
fn files_round_trip_through_methods() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.txt");
    let src = format!(
        "{{@ f = open(\"{p}\", \"w\") f.write(\"abc\") f.close() f = open(\"{p}\", \"a\") f.write(\"d\") f.close() @}}\
         {{: open(\"{p}\", \"r\").read() :}},{{: type(f) == type(open(\"{p}\", \"r\")) :}}",
        p = path.display()
    );
    assert_eq!(render(&src), "abcd,true");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "abcd");
    let closed = format!("{{@ f = open(\"{p}\", \"r\") f.close() f.read() @}}", p = path.display());
    assert_eq!(fail(&closed).0, format!("can't read \"{}\". file is closed", path.display()));
}

#[test]
fn partial_output_is_kept() {
    let mut k = kit();
    assert!(k.compile_from_str("a{: 1 :}b{@ puts(\"c\") nope() @}d").is_err());
    assert_eq!(k.stdout_buf(), "a1bc\n");
}

#[test]
fn lex_errors() {
    assert_eq!(fail("{@ 1. @}"), ("invalid float".into(), ErrorKind::Lex));
    assert_eq!(fail("{@ a @ b @}").0, "invalid syntax. single '@' is not supported");
    assert_eq!(fail("{@ a = 1").0, "not closed by block");
}

#[test]
fn parse_errors_name_the_construct() {
    assert_eq!(fail("{@ def f(): @}").0, "not found 'end' in parse func def");
    assert_eq!(fail("{@ for i < 3 @}").0, "syntax error. not found colon in for statement");
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

#[test]
fn string_methods() {
    let src = "{: \"hello world\".capitalize() :}|{: \"FooBar\".snake() :}|{: \"foo_bar\".camel() :}|{: \"  x \".strip() :}";
    assert_eq!(render(src), "Hello world|foo_bar|fooBar|x");
}

#[test]
fn dict_methods_and_types() {
    let src = "{@ d = {\"a\": 1} @}{: d.get(\"a\") :}{: d.get(\"b\", 2) :}{: d.pop(\"a\") :}{: len(d) :}{: type(d) == Dict :}";
    assert_eq!(render(src), "1210true");
}

#[test]
fn dance_returns_output_pair() {
    let src = "{@ r = dance(\"{: a + b :}\", {\"a\": 1, \"b\": 2}) @}{: r[0] :}{: r[1] :}";
    assert_eq!(render(src), "3nil");
}

#[test]
fn alias_table_is_recorded() {
    let mut k = kit();
    k.compile_from_str("{@ alias.set(\"gs\", \"git status\") @}").unwrap();
    let alias = k.context().alias("gs").unwrap();
    assert_eq!(alias.value, "git status");
    assert_eq!(alias.desc, None);
    assert_eq!(fail("{@ alias.set(\"x\") @}").0, "can't invoke alias.set. too few arguments");
}

// ── Imports ───────────────────────────────────────────────────────────────────

#[test]
fn modules_are_evaluated_once() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("counter.pad"), "{@ puts(\"loaded\") n = 1 @}").unwrap();
    let main = dir.path().join("main.pad");
    std::fs::write(
        &main,
        "{@ import \"counter.pad\" as a\nimport \"counter.pad\" as b\n@}{: a.n + b.n :}{: id(a) == id(b) :}",
    )
    .unwrap();
    let mut k = kit();
    k.compile_from_path(&main).unwrap();
    assert_eq!(k.stdout_buf(), "loaded\n2true");
}

#[test]
fn from_import_missing_name() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("m.pad"), "{@ x = 1 @}").unwrap();
    let main = dir.path().join("main.pad");
    std::fs::write(&main, "{@ from \"m.pad\" import y\n@}").unwrap();
    let mut k = kit();
    let err = k.compile_from_path(&main).unwrap_err();
    assert_eq!(err.message, "\"y\" is not defined in module \"m.pad\"");
}
