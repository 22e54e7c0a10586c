use crate::dvh::{Dvh, DvhError};
use crate::enums::{DoseUnits, DvhType, VolumeUnits};

use dicom::core::Tag;
use dicom::object::{InMemDicomObject, open_file};
use dicom_dictionary_std::tags;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DvhLoaderError {
    #[error("DVH Sequence has no DVH with ROI number {0}")]
    RoiNotFound(i32),

    #[error("Data set has no DVH Sequence")]
    MissingDvhSequence,

    #[error("DVH item is missing or has an invalid {0}")]
    MissingAttribute(&'static str),

    #[error("Invalid DVH: {0}")]
    Dvh(#[from] DvhError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("DICOM error: {0}")]
    Dicom(#[from] dicom::object::ReadError),
}

pub struct DvhLoader;

impl DvhLoader {
    /// Load the DVH of a region of interest from an RT Dose object
    ///
    /// # Arguments
    ///
    /// * `dicom_object` - RT Dose data set holding a DVH Sequence
    /// * `roi_number` - Referenced ROI Number of the wanted DVH
    /// * `rx_dose` - Prescription dose to attach, it is never read from the data set
    /// * `name` - Structure name to attach
    ///
    /// # Errors
    ///
    /// Returns error if no DVH references `roi_number` or its attributes are
    /// missing or malformed
    pub fn load_from_dicom_object(
        dicom_object: &InMemDicomObject,
        roi_number: i32,
        rx_dose: Option<f64>,
        name: Option<&str>,
    ) -> Result<Dvh, DvhLoaderError> {
        let item = Self::dvh_items(dicom_object)?
            .iter()
            .find(|item| Self::referenced_roi_number(item) == Some(roi_number))
            .ok_or(DvhLoaderError::RoiNotFound(roi_number))?;

        let mut dvh = Self::decode_dvh(item)?;
        if let Some(rx_dose) = rx_dose {
            dvh = dvh.with_rx_dose(rx_dose);
        }
        if let Some(name) = name {
            dvh = dvh.with_name(name);
        }
        debug!(roi_number, bins = dvh.counts().len(), "loaded DVH from DICOM");
        Ok(dvh)
    }

    /// Load the DVH of a region of interest from an RT Dose file
    pub fn load_from_file_path(
        path: impl AsRef<Path>,
        roi_number: i32,
        rx_dose: Option<f64>,
        name: Option<&str>,
    ) -> Result<Dvh, DvhLoaderError> {
        let object = open_file(path.as_ref())?;
        Self::load_from_dicom_object(&object, roi_number, rx_dose, name)
    }

    /// Load every DVH of an RT Dose object, keyed by Referenced ROI Number.
    /// Items without a ROI reference are skipped.
    pub fn load_all(dicom_object: &InMemDicomObject) -> Result<Vec<(i32, Dvh)>, DvhLoaderError> {
        Self::dvh_items(dicom_object)?
            .iter()
            .filter_map(|item| Some((Self::referenced_roi_number(item)?, item)))
            .map(|(roi_number, item)| Ok((roi_number, Self::decode_dvh(item)?)))
            .collect()
    }

    fn dvh_items(dicom_object: &InMemDicomObject) -> Result<&[InMemDicomObject], DvhLoaderError> {
        dicom_object
            .element(tags::DVH_SEQUENCE)
            .ok()
            .and_then(|element| element.items())
            .ok_or(DvhLoaderError::MissingDvhSequence)
    }

    fn referenced_roi_number(item: &InMemDicomObject) -> Option<i32> {
        item.element(tags::DVH_REFERENCED_ROI_SEQUENCE)
            .ok()?
            .items()?
            .first()?
            .element(tags::REFERENCED_ROI_NUMBER)
            .ok()?
            .to_int::<i32>()
            .ok()
    }

    fn string_attribute(
        item: &InMemDicomObject,
        tag: Tag,
        name: &'static str,
    ) -> Result<String, DvhLoaderError> {
        item.element(tag)
            .ok()
            .and_then(|element| element.to_str().ok())
            .map(|value| value.trim().to_string())
            .ok_or(DvhLoaderError::MissingAttribute(name))
    }

    /// Volume units and the factor taking the stored volumes into them.
    /// `PER_U` volumes are fractions of the structure and become percent.
    fn volume_units(value: &str) -> Result<(VolumeUnits, f64), DvhError> {
        if value.eq_ignore_ascii_case("PER_U") {
            return Ok((VolumeUnits::Percent, 100.0));
        }
        Ok((value.parse()?, 1.0))
    }

    /// DVH Data interleaves dose bin widths and volumes. Bin edges are the
    /// running sum of the widths, volumes are scaled by DVH Dose Scaling.
    fn decode_dvh(item: &InMemDicomObject) -> Result<Dvh, DvhLoaderError> {
        let data = item
            .element(tags::DVH_DATA)
            .ok()
            .and_then(|element| element.to_multi_float64().ok())
            .ok_or(DvhLoaderError::MissingAttribute("DVH Data"))?;
        let scaling = item
            .element(tags::DVH_DOSE_SCALING)
            .ok()
            .and_then(|element| element.to_float64().ok())
            .ok_or(DvhLoaderError::MissingAttribute("DVH Dose Scaling"))?;

        let dvh_type: DvhType = Self::string_attribute(item, tags::DVH_TYPE, "DVH Type")?.parse()?;
        let dose_units: DoseUnits =
            Self::string_attribute(item, tags::DOSE_UNITS, "Dose Units")?.parse()?;
        let (volume_units, volume_scale) = Self::volume_units(&Self::string_attribute(
            item,
            tags::DVH_VOLUME_UNITS,
            "DVH Volume Units",
        )?)?;

        let bins: Vec<f64> = data
            .iter()
            .step_by(2)
            .scan(0.0, |edge, &width| {
                *edge += width;
                Some(*edge)
            })
            .collect();
        let counts: Vec<f64> = data
            .iter()
            .skip(1)
            .step_by(2)
            .map(|&v| v * scaling * volume_scale)
            .collect();

        Ok(Dvh::new(counts, bins)?
            .with_dvh_type(dvh_type)
            .with_dose_units(dose_units)
            .with_volume_units(volume_units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicom::core::{DataElement, Length, PrimitiveValue, VR, value::DataSetSequence};
    use ndarray::array;

    fn dvh_item(
        roi_number: i32,
        data: &[f64],
        scaling: f64,
        volume_units: &str,
    ) -> InMemDicomObject {
        let roi_reference = InMemDicomObject::from_element_iter([DataElement::new(
            tags::REFERENCED_ROI_NUMBER,
            VR::IS,
            PrimitiveValue::from(roi_number.to_string()),
        )]);
        InMemDicomObject::from_element_iter([
            DataElement::new(
                tags::DVH_REFERENCED_ROI_SEQUENCE,
                VR::SQ,
                DataSetSequence::new(vec![roi_reference], Length::UNDEFINED),
            ),
            DataElement::new(tags::DVH_TYPE, VR::CS, PrimitiveValue::from("CUMULATIVE")),
            DataElement::new(tags::DOSE_UNITS, VR::CS, PrimitiveValue::from("GY")),
            DataElement::new(tags::DVH_VOLUME_UNITS, VR::CS, PrimitiveValue::from(volume_units)),
            DataElement::new(tags::DVH_DOSE_SCALING, VR::DS, PrimitiveValue::from(scaling)),
            DataElement::new(
                tags::DVH_DATA,
                VR::DS,
                PrimitiveValue::F64(data.iter().copied().collect()),
            ),
        ])
    }

    fn rt_dose(items: Vec<InMemDicomObject>) -> InMemDicomObject {
        InMemDicomObject::from_element_iter([DataElement::new(
            tags::DVH_SEQUENCE,
            VR::SQ,
            DataSetSequence::new(items, Length::UNDEFINED),
        )])
    }

    fn sample_rt_dose() -> InMemDicomObject {
        rt_dose(vec![
            dvh_item(1, &[1.0, 10.0, 1.0, 8.0, 1.0, 5.0, 1.0, 2.0, 1.0, 0.0], 1.0, "CM3"),
            dvh_item(7, &[2.0, 4.0, 2.0, 1.0], 0.5, "CM3"),
        ])
    }

    #[test]
    fn loads_dvh_by_roi_number() {
        let dvh = DvhLoader::load_from_dicom_object(&sample_rt_dose(), 1, Some(4.0), Some("PTV"))
            .unwrap();
        assert_eq!(dvh.bins(), array![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(dvh.counts(), array![10.0, 8.0, 5.0, 2.0, 0.0]);
        assert_eq!(dvh.dvh_type(), DvhType::Cumulative);
        assert_eq!(dvh.dose_units(), DoseUnits::Gy);
        assert_eq!(dvh.volume_units(), VolumeUnits::Cm3);
        assert_eq!(dvh.rx_dose(), Some(4.0));
        assert_eq!(dvh.name(), Some("PTV"));
    }

    #[test]
    fn scales_volumes_by_dose_scaling() {
        let dvh = DvhLoader::load_from_dicom_object(&sample_rt_dose(), 7, None, None).unwrap();
        assert_eq!(dvh.bins(), array![0.0, 2.0, 4.0]);
        assert_eq!(dvh.counts(), array![2.0, 0.5]);
        assert_eq!(dvh.rx_dose(), None);
    }

    #[test]
    fn per_unit_volumes_load_as_percent() {
        let dicom_object = rt_dose(vec![
            dvh_item(1, &[1.0, 10.0, 1.0, 8.0], 1.0, "CM3"),
            dvh_item(2, &[1.0, 1.0, 1.0, 0.5, 1.0, 0.0], 1.0, "PER_U"),
        ]);
        let dvh = DvhLoader::load_from_dicom_object(&dicom_object, 2, None, None).unwrap();
        assert_eq!(dvh.volume_units(), VolumeUnits::Percent);
        assert_eq!(dvh.counts(), array![100.0, 50.0, 0.0]);
        assert_eq!(dvh.relative_volume(), dvh);

        let all = DvhLoader::load_all(&dicom_object).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].1.volume_units(), VolumeUnits::Percent);
    }

    #[test]
    fn unknown_volume_units_are_an_error() {
        let dicom_object = rt_dose(vec![dvh_item(1, &[1.0, 10.0], 1.0, "MM3")]);
        let err = DvhLoader::load_from_dicom_object(&dicom_object, 1, None, None).unwrap_err();
        assert!(matches!(
            err,
            DvhLoaderError::Dvh(DvhError::UnknownVolumeUnits(units)) if units == "MM3"
        ));
    }

    #[test]
    fn missing_roi_is_an_error() {
        let err = DvhLoader::load_from_dicom_object(&sample_rt_dose(), 3, None, None).unwrap_err();
        assert!(matches!(err, DvhLoaderError::RoiNotFound(3)));
    }

    #[test]
    fn missing_sequence_is_an_error() {
        let err = DvhLoader::load_from_dicom_object(&InMemDicomObject::new_empty(), 1, None, None)
            .unwrap_err();
        assert!(matches!(err, DvhLoaderError::MissingDvhSequence));
    }

    #[test]
    fn load_all_keys_by_roi_number() {
        let all = DvhLoader::load_all(&sample_rt_dose()).unwrap();
        let rois: Vec<i32> = all.iter().map(|(roi, _)| *roi).collect();
        assert_eq!(rois, vec![1, 7]);
    }
}
