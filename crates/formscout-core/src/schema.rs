/// Arrow schema and batch builder for classified form fields.
pub mod fields {
    use arrow::array::{ArrayRef, StringArray, UInt8Array, UInt32Array, UInt64Array};
    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;
    use std::sync::Arc;

    use crate::model::DetectionResult;

    /// One row per classified field, flattened out of its section.
    pub fn field_classification_schema() -> Schema {
        Schema::new(vec![
            Field::new("section_index", DataType::UInt32, false),
            Field::new("section_title", DataType::Utf8, true),
            Field::new("element_id", DataType::UInt64, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("label", DataType::Utf8, false),
            Field::new("category", DataType::Utf8, false),
            Field::new("confidence", DataType::UInt8, false),
            Field::new("grouping", DataType::Utf8, false),
            Field::new("generation", DataType::UInt64, false),
            Field::new("jurisdiction", DataType::Utf8, false),
        ])
    }

    /// Flatten a result's sections into a single batch, document order.
    pub fn classifications_to_batch(result: &DetectionResult) -> Result<RecordBatch, ArrowError> {
        let mut section_index = Vec::new();
        let mut section_title: Vec<Option<&str>> = Vec::new();
        let mut element_id = Vec::new();
        let mut name = Vec::new();
        let mut label = Vec::new();
        let mut category = Vec::new();
        let mut confidence = Vec::new();
        let mut grouping = Vec::new();

        for (i, section) in result.sections.iter().enumerate() {
            for fc in &section.fields {
                section_index.push(i as u32);
                section_title.push(section.title.as_deref());
                element_id.push(fc.field.element.0 as u64);
                name.push(fc.field.name.as_str());
                label.push(fc.field.label.as_str());
                category.push(fc.category.as_str());
                confidence.push(fc.confidence);
                grouping.push(fc.grouping.as_str());
            }
        }

        let rows = element_id.len();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(UInt32Array::from(section_index)),
            Arc::new(StringArray::from(section_title)),
            Arc::new(UInt64Array::from(element_id)),
            Arc::new(StringArray::from(name)),
            Arc::new(StringArray::from(label)),
            Arc::new(StringArray::from(category)),
            Arc::new(UInt8Array::from(confidence)),
            Arc::new(StringArray::from(grouping)),
            Arc::new(UInt64Array::from(vec![result.generation; rows])),
            Arc::new(StringArray::from(vec![
                result.jurisdiction.code.as_str();
                rows
            ])),
        ];

        RecordBatch::try_new(Arc::new(field_classification_schema()), columns)
    }
}
