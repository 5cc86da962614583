use formplus::form::{FieldLens, FormModel};

#[derive(Clone, formplus::form::FormModel)]
struct DemoForm {
    email: String,
    remember_me: bool,
}

fn main() {
    let fields = DemoForm::fields();
    let lens = fields.email();
    let mut model = DemoForm {
        email: "a@example.com".to_string(),
        remember_me: false,
    };
    lens.set(&mut model, "b@example.com".to_string());
    assert_eq!(lens.key().as_str(), "email");
    assert_eq!(lens.get(&model), "b@example.com");

    fields.remember_me().set(&mut model, true);
    assert!(model.remember_me);
    assert_eq!(model.field_value("email"), Some("b@example.com"));
    assert_eq!(model.field_value("remember_me"), None);
    assert!(model.set_field_value("email", "c@example.com".to_string()));
    assert!(!model.set_field_value("remember_me", "true".to_string()));
}
