#[cfg(test)]
mod parser_tests {
    use crate::error::{format::FormatError, resolve::ResolveError};
    use crate::format::{
        models::{
            BinaryObjectString, ClassInfo, ClassRecord, Id, MemberTypeDescriptor, MemberValue,
            PrimitiveArrayValues, PrimitiveType, PrimitiveValue, Record, SerializationHeader,
        },
        parser::BinaryFormattedObject,
        writer::BinaryFormatWriter,
    };
    use crate::shapes::{BitmapPayload, ExtractorRegistry, BITMAP_TYPE_NAME};

    fn bitmap_stream() -> Vec<u8> {
        let mut bytes = vec![];
        BitmapPayload::new(vec![0x01, 0x02, 0x03])
            .write_to(&mut bytes)
            .unwrap();
        bytes
    }

    #[test]
    fn test_envelope_invariant() {
        let format = BinaryFormattedObject::parse(&bitmap_stream()).unwrap();

        // Header, library, class, payload array, terminator
        assert_eq!(format.record_count(), 5);
        assert!(matches!(format.record_at(0), Some(Record::Header(_))));
        assert!(matches!(format.record_at(4), Some(Record::End)));
    }

    #[test]
    fn test_record_lookup_by_id() {
        let format = BinaryFormattedObject::parse(&bitmap_stream()).unwrap();

        assert_eq!(format.root_id(), Id::new(1));
        let root = format.root_record().unwrap();
        match root {
            Record::Class(class) => {
                assert_eq!(class.name(), BITMAP_TYPE_NAME);
                assert_eq!(
                    class.member("Data"),
                    Some(&MemberValue::Reference(Id::new(3)))
                );
            }
            other => panic!("root should be a class record, got {other:?}"),
        }
        match format.record_by_id(Id::new(3)).unwrap() {
            Record::PrimitiveArray(array) => {
                assert_eq!(array.values.as_bytes(), Some(&[0x01, 0x02, 0x03][..]));
            }
            other => panic!("id 3 should be the payload array, got {other:?}"),
        }
    }

    #[test]
    fn test_bytes_consumed_stops_after_terminator() {
        let mut bytes = bitmap_stream();
        let clean_len = bytes.len();
        bytes.extend_from_slice(&[0xAB, 0xCD, 0xEF]);

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert_eq!(format.bytes_consumed(), clean_len);
    }

    #[test]
    fn test_missing_header_rejected() {
        let mut bytes = vec![];
        {
            let mut writer = BinaryFormatWriter::new(&mut bytes);
            writer
                .write_record(&Record::String(BinaryObjectString::new(Id::new(1), "a")))
                .unwrap();
            writer.write_record(&Record::End).unwrap();
        }
        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::InvalidHeader)
        ));
    }

    #[test]
    fn test_header_version_validated() {
        let mut bytes = vec![0x00];
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&(-1i32).to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes());
        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::InvalidHeader)
        ));
    }

    #[test]
    fn test_truncated_stream() {
        let mut bytes = bitmap_stream();
        bytes.pop();
        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::OutOfBounds(_, _))
        ));
    }

    #[test]
    fn test_invalid_record_tag() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        }
        bytes.push(0x63);
        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::InvalidRecordType(0x63))
        ));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut bytes = vec![];
        {
            let mut writer =
                BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1)))
                    .unwrap();
            writer
                .write_record(&Record::String(BinaryObjectString::new(Id::new(1), "a")))
                .unwrap();
            writer
                .write_record(&Record::String(BinaryObjectString::new(Id::new(1), "b")))
                .unwrap();
            writer.write_record(&Record::End).unwrap();
        }
        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::DuplicateId(id)) if id == Id::new(1)
        ));
    }

    #[test]
    fn test_bounded_allocation() {
        // An array declaring ten million entries with four bytes available
        // must fail on bounds, not exhaust memory
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(5))).unwrap();
        }
        bytes.push(0x0F);
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&10_000_000i32.to_le_bytes());
        bytes.push(2);
        bytes.extend_from_slice(&[0x01, 0x02, 0x03, 0x04]);

        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::OutOfBounds(_, _))
        ));
    }

    #[test]
    fn test_negative_array_length_rejected() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(5))).unwrap();
        }
        bytes.push(0x0F);
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&(-4i32).to_le_bytes());
        bytes.push(2);

        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::LengthOutOfRange(-4))
        ));
    }

    #[test]
    fn test_unknown_root_type_parses() {
        let mut bytes = vec![];
        {
            let mut writer =
                BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1)))
                    .unwrap();
            writer
                .write_record(&Record::Class(ClassRecord {
                    class_info: ClassInfo::new(
                        Id::new(1),
                        "Contoso.Widget",
                        vec!["Name".to_string()],
                    ),
                    member_types: vec![MemberTypeDescriptor::String],
                    library_id: Id::NULL,
                    member_values: vec![MemberValue::String(BinaryObjectString::new(
                        Id::new(2),
                        "widget",
                    ))],
                }))
                .unwrap();
            writer.write_record(&Record::End).unwrap();
        }

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert!(format.try_get_object(&ExtractorRegistry::default()).is_none());
        assert_eq!(
            format.resolve_type("Contoso.Widget", Id::NULL),
            Err(ResolveError::UnsupportedType("Contoso.Widget".to_string()))
        );
    }

    #[test]
    fn test_dangling_reference_reported_at_resolution() {
        let mut bytes = vec![];
        {
            let mut writer =
                BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1)))
                    .unwrap();
            writer
                .write_record(&Record::Class(ClassRecord {
                    class_info: ClassInfo::new(
                        Id::new(1),
                        "Contoso.Node",
                        vec!["Next".to_string()],
                    ),
                    member_types: vec![MemberTypeDescriptor::Object],
                    library_id: Id::NULL,
                    member_values: vec![MemberValue::Reference(Id::new(9))],
                }))
                .unwrap();
            writer.write_record(&Record::End).unwrap();
        }

        // The reference stays symbolic at parse time
        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        assert_eq!(
            format.record_by_id(Id::new(9)),
            Err(ResolveError::DanglingReference(Id::new(9)))
        );
        assert!(!format.has_cycle());
    }

    #[test]
    fn test_class_with_id_reuses_layout() {
        let mut bytes = vec![];
        {
            let mut writer =
                BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1)))
                    .unwrap();
            writer
                .write_record(&Record::Class(ClassRecord {
                    class_info: ClassInfo::new(
                        Id::new(1),
                        "Contoso.Counter",
                        vec!["Value".to_string()],
                    ),
                    member_types: vec![MemberTypeDescriptor::Primitive(PrimitiveType::Int32)],
                    library_id: Id::NULL,
                    member_values: vec![MemberValue::Primitive(PrimitiveValue::Int32(7))],
                }))
                .unwrap();
        }
        // A second instance reusing the first class's layout, then the terminator
        bytes.push(0x01);
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&9i32.to_le_bytes());
        bytes.push(0x0B);

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        match format.record_by_id(Id::new(5)).unwrap() {
            Record::Class(class) => {
                assert_eq!(class.name(), "Contoso.Counter");
                assert_eq!(
                    class.member("Value"),
                    Some(&MemberValue::Primitive(PrimitiveValue::Int32(9)))
                );
            }
            other => panic!("id 5 should be a class record, got {other:?}"),
        }
    }

    #[test]
    fn test_class_with_forward_metadata_rejected() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(5))).unwrap();
        }
        bytes.push(0x01);
        bytes.extend_from_slice(&5i32.to_le_bytes());
        bytes.extend_from_slice(&42i32.to_le_bytes());

        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::UnknownMetadataId(id)) if id == Id::new(42)
        ));
    }

    #[test]
    fn test_null_run_expands_into_array() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        }
        // Object array of four: one string element, then a run of three nulls
        bytes.push(0x10);
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&4i32.to_le_bytes());
        bytes.push(0x06);
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.push(1);
        bytes.push(b'x');
        bytes.push(0x0D);
        bytes.push(3);
        bytes.push(0x0B);

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        match format.root_record().unwrap() {
            Record::ObjectArray(array) => {
                assert_eq!(array.values.len(), 4);
                assert_eq!(
                    array.values[0],
                    MemberValue::String(BinaryObjectString::new(Id::new(2), "x"))
                );
                assert_eq!(array.values[1..], [MemberValue::Null, MemberValue::Null, MemberValue::Null]);
            }
            other => panic!("root should be an object array, got {other:?}"),
        }
    }

    #[test]
    fn test_null_run_past_declared_length_rejected() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        }
        bytes.push(0x10);
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&2i32.to_le_bytes());
        bytes.push(0x0D);
        bytes.push(5);

        assert!(matches!(
            BinaryFormattedObject::parse(&bytes),
            Err(FormatError::LengthOutOfRange(5))
        ));
    }

    #[test]
    fn test_primitive_array_of_int32() {
        let mut bytes = vec![];
        {
            BinaryFormatWriter::start(&mut bytes, SerializationHeader::new(Id::new(1))).unwrap();
        }
        bytes.push(0x0F);
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&3i32.to_le_bytes());
        bytes.push(8);
        for value in [1i32, -2, 3] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.push(0x0B);

        let format = BinaryFormattedObject::parse(&bytes).unwrap();
        match format.root_record().unwrap() {
            Record::PrimitiveArray(array) => {
                assert_eq!(array.values, PrimitiveArrayValues::Int32(vec![1, -2, 3]));
            }
            other => panic!("root should be a primitive array, got {other:?}"),
        }
    }

    #[test]
    fn test_datetime_and_timespan_conversion() {
        // .NET ticks for the Unix epoch, with the UTC kind flag set
        let epoch = PrimitiveValue::DateTime(621_355_968_000_000_000 | (1 << 62));
        assert_eq!(
            epoch.as_datetime(),
            chrono::DateTime::from_timestamp(0, 0)
        );

        let later = PrimitiveValue::DateTime(621_355_968_000_000_000 + 15_000_000);
        assert_eq!(
            later.as_datetime(),
            chrono::DateTime::from_timestamp(1, 500_000_000)
        );

        let span = PrimitiveValue::TimeSpan(25_000_000);
        assert_eq!(span.as_timespan(), chrono::TimeDelta::new(2, 500_000_000));

        assert_eq!(PrimitiveValue::Int32(0).as_datetime(), None);
    }
}
