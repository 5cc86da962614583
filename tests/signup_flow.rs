use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use formplus::prelude::*;
use futures::executor::block_on;
use futures::future;

const TAKEN_EMAIL_BODY: &str =
    r#"{"email": ["Este e-mail já está em uso", "Escolha outro"], "name": "Nome inválido"}"#;

fn signup_schema(i18n: I18nManager) -> Schema {
    Schema::builder()
        .i18n(i18n)
        .field("name", |rules| rules.required())
        .field("email", |rules| rules.required().email())
        .field("password", |rules| rules.required().min_length(8))
        .field("password2", |rules| rules.required().equals("password"))
        .field("initial_balance", |rules| rules.decimal())
        .build()
        .expect("signup schema")
}

fn blank_signup() -> FormValues {
    ["name", "email", "password", "password2", "initial_balance"]
        .into_iter()
        .map(|field| (field, ""))
        .collect()
}

fn fill(form: &FormPlus<FormValues, String>, email: &str) {
    for (field, value) in [
        ("name", "Ana Souza"),
        ("email", email),
        ("password", "correct horse"),
        ("password2", "correct horse"),
        ("initial_balance", "1250,00"),
    ] {
        form.set_field(field, value).expect("set field");
        form.touch(field).expect("touch field");
    }
}

/// Plays the backend: one address is taken, the server answers with JSON.
fn backend(requests: Arc<AtomicUsize>) -> Mutation<FormValues, String> {
    Mutation::new(move |values: FormValues| {
        requests.fetch_add(1, Ordering::SeqCst);
        async move {
            let body = match serde_json::to_value(&values) {
                Ok(body) => body,
                Err(error) => return Err(MutationError::unstructured(error.to_string())),
            };
            match body["email"].as_str() {
                Some("taken@example.com") => Err(MutationError::from_body(TAKEN_EMAIL_BODY)),
                Some("down@example.com") => Err(MutationError::from_body("502 Bad Gateway")),
                _ => Ok(format!("welcome {}", body["name"].as_str().unwrap_or_default())),
            }
        }
    })
}

#[test]
fn signup_flow_from_blank_form_to_created_account() {
    let requests = Arc::new(AtomicUsize::new(0));
    let form = FormPlus::with_options(
        blank_signup(),
        FormOptions {
            validate_mode: ValidationMode::OnBlur,
            revalidate_mode: RevalidateMode::OnChange,
        },
        signup_schema(I18nManager::with_locale("pt-BR")),
        backend(requests.clone()),
    );

    let outcome = block_on(form.submit(MutationCallbacks::new())).expect("blank submit");
    assert_eq!(outcome, SubmitOutcome::Invalid);
    assert_eq!(requests.load(Ordering::SeqCst), 0);
    assert_eq!(
        form.error_message("name").expect("message"),
        Some("Campo obrigatório".to_string())
    );
    assert!(!form.field_has_error("initial_balance").expect("optional"));

    fill(&form, "taken@example.com");
    let outcome = block_on(form.submit(MutationCallbacks::new())).expect("taken submit");
    assert!(!outcome.is_success());
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    assert_eq!(
        form.error_message("email").expect("message"),
        Some("Este e-mail já está em uso; Escolha outro".to_string())
    );
    assert_eq!(
        form.error_message("name").expect("message"),
        Some("Nome inválido".to_string())
    );
    assert_eq!(form.form_error().expect("banner"), None);

    form.set_field("email", "down@example.com").expect("set email");
    let outcome = block_on(form.submit(MutationCallbacks::new())).expect("outage submit");
    assert!(!outcome.is_success());
    assert!(!form.field_has_error("email").expect("server errors cleared"));
    assert_eq!(
        form.form_error().expect("banner"),
        Some("502 Bad Gateway".to_string())
    );

    form.set_field("email", "ana@example.com").expect("set email");
    let welcomed = Arc::new(std::sync::Mutex::new(String::new()));
    let callbacks = {
        let welcomed = welcomed.clone();
        MutationCallbacks::new().on_success(move |message: &String| {
            *welcomed.lock().expect("welcome lock") = message.clone();
        })
    };
    let outcome = block_on(form.submit(callbacks)).expect("final submit");
    assert!(outcome.is_success());
    assert_eq!(*welcomed.lock().expect("welcome lock"), "welcome Ana Souza");
    assert!(form.errors().expect("errors").is_empty());
    assert_eq!(
        form.form().submit_state().expect("submit state"),
        SubmitState::Succeeded
    );
    assert_eq!(requests.load(Ordering::SeqCst), 3);
}

#[test]
fn slow_backend_times_out_with_localized_banner() {
    let mutation = Mutation::new(|_values: FormValues| future::pending::<Result<String, _>>())
        .with_options(MutationOptions {
            timeout: Some(Duration::from_millis(20)),
        });
    let form = FormPlus::new(
        blank_signup(),
        signup_schema(I18nManager::with_locale("en-US")),
        mutation,
    );
    fill(&form, "ana@example.com");

    let outcome = block_on(form.submit(MutationCallbacks::new())).expect("submit");
    assert_eq!(
        outcome,
        SubmitOutcome::Sent(MutationOutcome::Failed(MutationError::TimedOut(
            Duration::from_millis(20)
        )))
    );
    assert_eq!(
        form.form_error().expect("banner"),
        Some("The request took too long. Please try again.".to_string())
    );
    assert!(!form.is_pending().expect("pending"));
}
