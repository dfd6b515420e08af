#[cfg(test)]
mod shape_tests {
    use crate::format::{
        models::{
            ArraySinglePrimitive, BinaryLibrary, BinaryObjectString, ClassInfo, ClassRecord, Id,
            MemberTypeDescriptor, MemberValue, PrimitiveType, PrimitiveValue, Record,
            SerializationHeader,
        },
        parser::BinaryFormattedObject,
        writer::BinaryFormatWriter,
    };
    use crate::shapes::{
        BitmapPayload, ExtractorRegistry, JsonEnvelope, KnownShape, ShapeExtractor,
        BITMAP_TYPE_NAME, SYSTEM_DRAWING_LIBRARY_NAME,
    };

    /// A stream whose root class mimics the image raster shape with the
    /// given member name and value
    fn wrapper_stream(member_name: &str, member_value: MemberValue) -> Vec<u8> {
        let mut bytes = vec![];
        let mut writer =
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        writer
            .write_record(&Record::Library(BinaryLibrary::new(
                Id::new(2),
                SYSTEM_DRAWING_LIBRARY_NAME,
            )))
            .unwrap();
        writer
            .write_record(&Record::Class(ClassRecord {
                class_info: ClassInfo::new(
                    Id::new(1),
                    BITMAP_TYPE_NAME,
                    vec![member_name.to_string()],
                ),
                member_types: vec![MemberTypeDescriptor::Object],
                library_id: Id::new(2),
                member_values: vec![member_value],
            }))
            .unwrap();
        writer
            .write_record(&Record::PrimitiveArray(ArraySinglePrimitive::bytes(
                Id::new(3),
                vec![0x01, 0x02],
            )))
            .unwrap();
        writer.finish().unwrap();
        bytes
    }

    #[test]
    fn test_wrong_member_name_is_no_match() {
        let bytes = wrapper_stream("Pixels", MemberValue::Reference(Id::new(3)));
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert!(format.try_get_object(&ExtractorRegistry::default()).is_none());
    }

    #[test]
    fn test_wrong_member_shape_is_no_match() {
        let bytes = wrapper_stream(
            "Data",
            MemberValue::String(BinaryObjectString::new(Id::new(4), "not bytes")),
        );
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert!(format.try_get_object(&ExtractorRegistry::default()).is_none());
    }

    #[test]
    fn test_reference_into_wrong_record_is_no_match() {
        // "Data" points at the library record instead of a byte array
        let bytes = wrapper_stream("Data", MemberValue::Reference(Id::new(2)));
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert!(format.try_get_object(&ExtractorRegistry::default()).is_none());
    }

    #[test]
    fn test_inline_payload_matches() {
        let bytes = wrapper_stream(
            "Data",
            MemberValue::PrimitiveArray(ArraySinglePrimitive::bytes(Id::new(4), vec![0x09])),
        );
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert_eq!(
            format.try_get_object(&ExtractorRegistry::default()),
            Some(KnownShape::Bitmap(BitmapPayload::new(vec![0x09])))
        );
    }

    #[test]
    fn test_empty_registry_matches_nothing() {
        let mut bytes = vec![];
        BitmapPayload::new(vec![0x01]).write_to(&mut bytes).unwrap();
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert!(format.try_get_object(&ExtractorRegistry::empty()).is_none());
    }

    #[test]
    fn test_invalid_json_payload_surfaces_from_value() {
        let mut bytes = vec![];
        JsonEnvelope::new("not json at all").write_to(&mut bytes).unwrap();
        let format = BinaryFormattedObject::parse(&bytes).unwrap();

        // Recognition is structural; the payload text is not inspected
        match format.try_get_object(&ExtractorRegistry::default()) {
            Some(KnownShape::Json(envelope)) => assert!(envelope.value().is_err()),
            other => panic!("expected a JSON envelope, got {other:?}"),
        }
    }

    /// A host-supplied extractor for a class carrying one string member
    struct WidgetShape;

    impl ShapeExtractor for WidgetShape {
        fn try_extract(&self, format: &BinaryFormattedObject) -> Option<KnownShape> {
            let root = match format.root_record().ok()? {
                Record::Class(class) => class,
                _ => return None,
            };
            if root.name() != "Contoso.Widget" {
                return None;
            }
            match root.member("Name")? {
                MemberValue::String(string) => Some(KnownShape::String(string.value.clone())),
                _ => None,
            }
        }
    }

    fn widget_stream() -> Vec<u8> {
        let mut bytes = vec![];
        let mut writer =
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        writer
            .write_record(&Record::Class(ClassRecord {
                class_info: ClassInfo::new(Id::new(1), "Contoso.Widget", vec!["Name".to_string()]),
                member_types: vec![MemberTypeDescriptor::String],
                library_id: Id::NULL,
                member_values: vec![MemberValue::String(BinaryObjectString::new(
                    Id::new(2),
                    "gadget",
                ))],
            }))
            .unwrap();
        writer.finish().unwrap();
        bytes
    }

    #[test]
    fn test_host_extractor_appended_to_registry() {
        let format = BinaryFormattedObject::parse(&widget_stream()).unwrap();

        let mut registry = ExtractorRegistry::default();
        assert!(format.try_get_object(&registry).is_none());

        registry.register(Box::new(WidgetShape));
        assert_eq!(
            format.try_get_object(&registry),
            Some(KnownShape::String("gadget".to_string()))
        );
    }

    #[test]
    fn test_builtins_run_before_host_extractors() {
        /// Claims everything; must never win over a built-in match
        struct GreedyShape;

        impl ShapeExtractor for GreedyShape {
            fn try_extract(&self, _: &BinaryFormattedObject) -> Option<KnownShape> {
                Some(KnownShape::String("intercepted".to_string()))
            }
        }

        let mut bytes = vec![];
        BitmapPayload::new(vec![0x07]).write_to(&mut bytes).unwrap();
        let format = BinaryFormattedObject::parse(&bytes).unwrap();

        let mut registry = ExtractorRegistry::default();
        registry.register(Box::new(GreedyShape));
        assert_eq!(
            format.try_get_object(&registry),
            Some(KnownShape::Bitmap(BitmapPayload::new(vec![0x07])))
        );
    }

    #[test]
    fn test_primitive_member_types_preserved() {
        // The descriptor list survives parsing for structural inspection
        let mut bytes = vec![];
        let mut writer =
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        writer
            .write_record(&Record::Class(ClassRecord {
                class_info: ClassInfo::new(
                    Id::new(1),
                    "Contoso.Reading",
                    vec!["Celsius".to_string()],
                ),
                member_types: vec![MemberTypeDescriptor::Primitive(PrimitiveType::Double)],
                library_id: Id::NULL,
                member_values: vec![MemberValue::Primitive(
                    PrimitiveValue::Double(21.5),
                )],
            }))
            .unwrap();
        writer.finish().unwrap();

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        match format.root_record().unwrap() {
            Record::Class(class) => {
                assert_eq!(
                    class.member_types,
                    vec![MemberTypeDescriptor::Primitive(PrimitiveType::Double)]
                );
                assert_eq!(
                    class.member("Celsius"),
                    Some(&MemberValue::Primitive(
                        PrimitiveValue::Double(21.5)
                    ))
                );
            }
            other => panic!("root should be a class record, got {other:?}"),
        }
    }
}
