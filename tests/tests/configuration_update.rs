use amf::data::AccessType;
use amf_tests::{MockUe, framework::*, subscribed_snssai};

#[async_std::test]
async fn configuration_update() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    amf.configuration_update(&ue.imsi, AccessType::ThreeGpp)
        .await?;
    let command = ue.handle_configuration_update_command().await?;
    assert!(command.acknowledgement_requested);
    assert_eq!(command.guti, ue.guti);
    assert_eq!(command.allowed_nssai, vec![subscribed_snssai()]);
    gnb.expect_no_ngap().await
}

#[async_std::test]
async fn notification_over_3gpp_access() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    amf.send_notification(&ue.imsi, AccessType::NonThreeGpp)
        .await?;
    let notification = ue.handle_notification().await?;
    assert_eq!(notification.access_type, AccessType::NonThreeGpp.nas_value());
    gnb.expect_no_ngap().await
}
