//! End-to-end diagnostic scenarios through the verify consumer.
//!
//! Each case is a self-contained input whose `! expected-error {{...}}`
//! annotations must match the emitted diagnostics exactly: a missing
//! expectation or an unexpected diagnostic fails verification.

use ftn_core::{CompileError, CompileOptions, Compiler, SourceForm};

fn verify(path: &str, source: &str) {
    let mut compiler = Compiler::new(CompileOptions {
        verify: true,
        ..CompileOptions::default()
    });
    let id = compiler.add_source(path, source);
    match compiler.compile_source(id) {
        Ok(_) => {}
        Err(CompileError::Verify(failures)) => {
            panic!("verification failed for {}:\n{}", path, failures)
        }
        Err(other) => panic!("unexpected failure for {}: {}", path, other),
    }
}

#[test]
fn substring_bound_must_be_integer() {
    verify(
        "substring.f90",
        "PROGRAM P\n\
         CHARACTER(LEN=16) :: C\n\
         C = 'HELLO'(1:'FALSE') ! expected-error {{expected an integer expression}}\n\
         END\n",
    );
}

#[test]
fn star_dimension_only_last() {
    verify(
        "stardim.f90",
        "SUBROUTINE S(A)\n\
         INTEGER A(*,*) ! expected-error {{dimension declarator '*' must be used only in the last dimension}}\n\
         END\n",
    );
}

#[test]
fn array_bound_must_be_integer_constant() {
    verify(
        "bounds.f90",
        "PROGRAM P\n\
         INTEGER A(.false.:2) ! expected-error {{expected an integer constant expression}}\n\
         END\n",
    );
}

#[test]
fn incompatible_assignment() {
    verify(
        "assign.f90",
        "PROGRAM P\n\
         REAL X\n\
         CHARACTER C\n\
         X = C ! expected-error {{incompatible types in assignment ('REAL' and 'CHARACTER')}}\n\
         END\n",
    );
}

#[test]
fn statement_label_redefinition() {
    verify(
        "labels.f90",
        "PROGRAM P\n\
         GOTO 100\n\
         100 CONTINUE\n\
         100 CONTINUE ! expected-error {{redefinition of statement label '100'}}\n\
         END\n",
    );
}

#[test]
fn unterminated_if_construct() {
    verify(
        "endif.f90",
        "PROGRAM P\n\
         IF (.TRUE.) THEN\n\
         END ! expected-error {{expected END IF}}\n",
    );
}

#[test]
fn undeclared_statement_label() {
    verify(
        "undeclared.f90",
        "PROGRAM P\n\
         GOTO 42 ! expected-error {{use of undeclared statement label '42'}}\n\
         END\n",
    );
}

#[test]
fn invalid_do_terminator() {
    verify(
        "doterm.f90",
        "PROGRAM P\n\
         DO 10 I = 1, 5\n\
         10 STOP ! expected-error {{invalid DO terminating statement}}\n\
         END\n",
    );
}

#[test]
fn implicit_none_blocks_undeclared() {
    verify(
        "implicitnone.f90",
        "PROGRAM P\n\
         IMPLICIT NONE\n\
         X = 1.0 ! expected-error {{no implicit type for variable 'X'}}\n\
         END\n",
    );
}

#[test]
fn redeclaration_with_note() {
    verify(
        "redecl.f90",
        "PROGRAM P\n\
         REAL X ! expected-note {{previous declaration}}\n\
         REAL X ! expected-error {{variable 'X' already declared}}\n\
         END\n",
    );
}

#[test]
fn expected_logical_condition() {
    verify(
        "cond.f90",
        "PROGRAM P\n\
         IF (1) THEN ! expected-error {{expected a logical expression ('INTEGER')}}\n\
         END IF ! expected-error {{END IF statement not in an IF construct}}\n\
         END\n",
    );
}

#[test]
fn clean_program_verifies_with_no_expectations() {
    verify(
        "clean.f90",
        "PROGRAM P\n\
         REAL A(10), B(10)\n\
         DO 10 I = 1, 10\n\
         A(I) = 0.0\n\
         10 CONTINUE\n\
         A = B + 1.0\n\
         END\n",
    );
}

#[test]
fn fixed_form_scenarios_verify_too() {
    let mut compiler = Compiler::new(CompileOptions {
        verify: true,
        form: Some(SourceForm::Fixed),
        ..CompileOptions::default()
    });
    let id = compiler.add_source(
        "fixed.f",
        concat!(
            "      PROGRAM P\n",
            "C     a comment line\n",
            "      GO TO 10\n",
            "   10 CONTINUE\n",
            "      END\n",
        ),
    );
    assert!(compiler.compile_source(id).is_ok());
}

#[test]
fn end_program_name_mismatch() {
    verify(
        "endname.f90",
        "PROGRAM P\n\
         END PROGRAM Q ! expected-error {{expected label 'P' for END PROGRAM statement}}\n",
    );
}

#[test]
fn do_label_must_be_declared_after() {
    verify(
        "dolabel.f90",
        "PROGRAM P\n\
         10 CONTINUE\n\
         DO 10 I = 1, 5 ! expected-error {{statement label '10' must be declared after the DO statement}}\n\
         END\n",
    );
}
