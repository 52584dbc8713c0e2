use proptest::prelude::*;
use tts_diagnose::{
    domain::Domain,
    error::DiagnoseError,
    schema::{Schema, SchemaAttribute, TypeTag},
    validate::{SchemaOrigin, validate},
};

fn type_tag() -> impl Strategy<Value = TypeTag> {
    prop_oneof![
        Just(TypeTag::String),
        Just(TypeTag::Integer),
        Just(TypeTag::Float),
        Just(TypeTag::Timestamp),
    ]
}

/// A domain with a shuffled column list: every required field, a random
/// subset of correctly typed optional fields and a few `extra_*` columns.
fn domain_columns() -> impl Strategy<Value = (Domain, Vec<(String, TypeTag)>)> {
    proptest::sample::select(Domain::ALL.to_vec()).prop_flat_map(|domain| {
        let template = domain.template();
        let keep_optional = proptest::collection::vec(any::<bool>(), template.optional.len());
        let extras = proptest::collection::vec(type_tag(), 0..6);
        (keep_optional, extras)
            .prop_map(move |(keep_optional, extras)| {
                let mut columns = template
                    .required
                    .iter()
                    .map(|spec| (spec.name.to_string(), spec.attribute_type))
                    .collect::<Vec<_>>();
                columns.extend(
                    template
                        .optional
                        .iter()
                        .zip(keep_optional)
                        .filter(|(_, keep)| *keep)
                        .map(|(spec, _)| (spec.name.to_string(), spec.attribute_type)),
                );
                columns.extend(
                    extras
                        .into_iter()
                        .enumerate()
                        .map(|(index, ty)| (format!("extra_{index}"), ty)),
                );
                columns
            })
            .prop_shuffle()
            .prop_map(move |columns| (domain, columns))
    })
}

fn schema(columns: &[(String, TypeTag)]) -> Schema {
    Schema::new(
        columns
            .iter()
            .map(|(name, ty)| SchemaAttribute::new(name.as_str(), *ty).unwrap())
            .collect(),
    )
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn classification_follows_template_order((domain, columns) in domain_columns()) {
        let template = domain.template();
        let schema = schema(&columns);
        let first = validate(&schema, domain, SchemaOrigin::Explicit).unwrap();

        let required = template
            .required
            .iter()
            .map(|spec| spec.name.to_string())
            .collect::<Vec<_>>();
        prop_assert_eq!(&first.required, &required);

        let optional = template
            .optional
            .iter()
            .filter(|spec| columns.iter().any(|(name, _)| name == spec.name))
            .map(|spec| spec.name.to_string())
            .collect::<Vec<_>>();
        prop_assert_eq!(&first.optional, &optional);

        let custom = columns
            .iter()
            .filter(|(name, _)| name.starts_with("extra_"))
            .map(|(name, _)| name.clone())
            .collect::<Vec<_>>();
        prop_assert_eq!(&first.custom, &custom);

        let second = validate(&schema, domain, SchemaOrigin::Explicit).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn dropping_any_required_field_is_reported((domain, columns) in domain_columns()) {
        for spec in domain.template().required {
            let remaining = columns
                .iter()
                .filter(|(name, _)| name != spec.name)
                .cloned()
                .collect::<Vec<_>>();
            let err = validate(&schema(&remaining), domain, SchemaOrigin::Inferred).unwrap_err();
            prop_assert!(
                matches!(err, DiagnoseError::MissingRequiredField { field, .. } if field == spec.name),
                "{domain}: {err}"
            );
        }
    }
}
