use crate::form::FormModel as _;
use crate::form::FieldLens as _;
use rust_decimal::Decimal;

#[derive(Clone, crate::form::FormModel)]
struct ApiSmokeForm {
    title: String,
    amount: String,
    enabled: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct ApiSmokeError(&'static str);

impl crate::form::ValidationError for ApiSmokeError {
    fn message(&self) -> String {
        self.0.to_string()
    }
}

fn validate_smoke_title(_model: &ApiSmokeForm, value: &String) -> Result<(), ApiSmokeError> {
    if value.trim().is_empty() {
        Err(ApiSmokeError("required"))
    } else {
        Ok(())
    }
}

#[test]
fn prelude_exports_the_form_session() {
    use crate::prelude::*;

    let schema = Schema::builder()
        .field("email", |rules| rules.required().email())
        .build()
        .expect("schema");
    let mutation = Mutation::new(|values: FormValues| async move {
        Ok::<_, MutationError>(values.len())
    })
    .with_options(MutationOptions::default());
    let form: FormPlus<FormValues, usize> =
        FormPlus::new(FormValues::new().with("email", ""), schema, mutation);
    let _: FormResult<bool> = form.is_pending();
    let _ = MutationCallbacks::<usize>::new();
    let _ = (SubmitState::Idle, MutationStatus::Idle, ValidationMode::OnSubmit);
    let _ = RevalidateMode::OnChange;
    let _ = FieldErrors::new();
    let _ = ServerFieldErrors::new();
    let _ = I18nManager::with_locale(Locale::System);
    let _: Option<&FormController<FormValues>> = Some(form.form());
    let _: Option<MutationOutcome<usize>> = None;
    let _: Option<SubmitOutcome<usize>> = None;
    let _ = FieldKey::new("email");
    let _: Option<FormError> = None;
    let _: FormOptions = FormOptions::default();
}

#[test]
fn form_public_api_smoke_compiles() {
    let controller = crate::form::FormController::<ApiSmokeForm>::new(
        ApiSmokeForm {
            title: "draft".into(),
            amount: "5.00".into(),
            enabled: false,
        },
        crate::form::FormOptions::default(),
    )
    .with_schema(
        crate::form::Schema::builder()
            .field("amount", |rules| rules.decimal().positive())
            .build()
            .expect("schema"),
    );
    let fields = ApiSmokeForm::fields();

    controller
        .register_field_validator(fields.title(), validate_smoke_title)
        .expect("register field validator");
    controller
        .register_required_field(fields.title())
        .expect("register required");
    controller
        .register_dependency(fields.title().key(), fields.amount().key())
        .expect("register dependency");
    controller
        .set(fields.title(), String::new())
        .expect("set value");
    controller.set(fields.enabled(), true).expect("set flag");
    controller.touch("title").expect("touch field");
    assert!(!controller.validate_form().expect("validate form"));
    assert_eq!(
        controller
            .field_error_for_display("title")
            .expect("display error"),
        Some("required".to_string())
    );
    assert_eq!(
        crate::form::parse_decimal("5.00"),
        Some(Decimal::from_i128_with_scale(500, 2))
    );

    controller.reset_to_initial().expect("reset");
    assert!(controller.errors().expect("errors").is_empty());
}
