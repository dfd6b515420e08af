#[cfg(test)]
mod writer_tests {
    use std::io::Write;

    use crate::format::{
        models::{ArrayInfo, ArraySinglePrimitive, Id, PrimitiveArrayValues, PrimitiveValue, Record},
        parser::BinaryFormattedObject,
    };
    use crate::shapes::{
        framework, BitmapPayload, ExtractorRegistry, ImageListPayload, JsonEnvelope, KnownShape,
    };

    fn extract(bytes: &[u8]) -> Option<KnownShape> {
        let format = BinaryFormattedObject::parse(bytes).unwrap();
        format.try_get_object(&ExtractorRegistry::default())
    }

    #[test]
    fn test_bitmap_roundtrip() {
        let payload = BitmapPayload::new(vec![0x01, 0x02, 0x03]);
        let mut bytes = vec![];
        payload.write_to(&mut bytes).unwrap();

        assert_eq!(extract(&bytes), Some(KnownShape::Bitmap(payload)));
    }

    #[test]
    fn test_image_list_roundtrip() {
        let payload = ImageListPayload::new(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let mut bytes = vec![];
        payload.write_to(&mut bytes).unwrap();

        assert_eq!(extract(&bytes), Some(KnownShape::ImageList(payload)));
    }

    #[test]
    fn test_json_roundtrip() {
        let envelope = JsonEnvelope::new(r#"{"x":1}"#);
        let mut bytes = vec![];
        envelope.write_to(&mut bytes).unwrap();

        match extract(&bytes) {
            Some(KnownShape::Json(extracted)) => {
                assert_eq!(extracted.json_string, r#"{"x":1}"#);
                assert_eq!(extracted.type_name, None);
                assert_eq!(extracted.value().unwrap()["x"].as_i32(), Some(1));
            }
            other => panic!("expected a JSON envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_json_data_object_roundtrip() {
        let envelope =
            JsonEnvelope::with_type_name(r#"{"sunny":true}"#, "Contoso.Weather, Contoso");
        let mut bytes = vec![];
        envelope.write_to(&mut bytes).unwrap();

        match extract(&bytes) {
            Some(KnownShape::Json(extracted)) => {
                assert_eq!(extracted.json_string, r#"{"sunny":true}"#);
                assert_eq!(
                    extracted.type_name.as_deref(),
                    Some("Contoso.Weather, Contoso")
                );
            }
            other => panic!("expected a JSON envelope, got {other:?}"),
        }
    }

    #[test]
    fn test_string_roundtrip() {
        let mut bytes = vec![];
        framework::write_string(&mut bytes, "hello 세계").unwrap();

        assert_eq!(extract(&bytes), Some(KnownShape::String("hello 세계".to_string())));
    }

    #[test]
    fn test_primitive_roundtrip() {
        for value in [
            PrimitiveValue::Int32(42),
            PrimitiveValue::Bool(true),
            PrimitiveValue::Double(-0.5),
            PrimitiveValue::Char('中'),
            PrimitiveValue::Decimal("12.34".to_string()),
        ] {
            let mut bytes = vec![];
            framework::write_primitive(&mut bytes, &value).unwrap();

            assert_eq!(extract(&bytes), Some(KnownShape::Primitive(value)));
        }
    }

    #[test]
    fn test_primitive_array_roundtrip() {
        let array = ArraySinglePrimitive {
            array_info: ArrayInfo::new(Id::new(1), 3),
            values: PrimitiveArrayValues::Int64(vec![1, -2, 3]),
        };
        let mut bytes = vec![];
        framework::write_primitive_array(&mut bytes, &array).unwrap();

        assert_eq!(
            extract(&bytes),
            Some(KnownShape::PrimitiveArray(PrimitiveArrayValues::Int64(
                vec![1, -2, 3]
            )))
        );
    }

    #[test]
    fn test_json_stream_shape() {
        let mut bytes = vec![];
        JsonEnvelope::new("{}").write_to(&mut bytes).unwrap();

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert_eq!(format.record_count(), 4);
        assert!(matches!(format.record_at(0), Some(Record::Header(_))));
        assert!(matches!(format.record_at(1), Some(Record::Library(_))));
        assert!(matches!(format.record_at(2), Some(Record::Class(_))));
        assert!(matches!(format.record_at(3), Some(Record::End)));
    }

    /// A sink that refuses every write
    struct ClosedSink;

    impl Write for ClosedSink {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink closed",
            ))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_sink_failure_propagates() {
        let error = BitmapPayload::new(vec![0x01])
            .write_to(&mut ClosedSink)
            .unwrap_err();
        assert_eq!(error.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
