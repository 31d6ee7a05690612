//! Compile-time tests for the `FlagStruct` derive macro.
//!
//! Each file under `tests/compile_pass` must build and run successfully.

#[test]
fn compile_pass() {
    let t = trybuild::TestCases::new();
    t.pass("tests/compile_pass/basic.rs");
    t.pass("tests/compile_pass/nested.rs");
    t.pass("tests/compile_pass/sensitive.rs");
    t.pass("tests/compile_pass/all_options.rs");
}
