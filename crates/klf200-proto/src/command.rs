//! The gateway command table.
//!
//! Every protocol message carries a 16-bit command identifying it as the
//! request (`*Req`), confirm (`*Cfm`) or notification (`*Ntf`) leg of an
//! operation. The table below is the complete command set spoken by the
//! KLF200 family.

/// A 16-bit protocol command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Sentinel for "no command" / "no confirm expected".
    Unset = 0xFFFF,
    ErrorNtf = 0x0000,
    RebootReq = 0x0001,
    RebootCfm = 0x0002,
    SetFactoryDefaultReq = 0x0003,
    SetFactoryDefaultCfm = 0x0004,
    GetVersionReq = 0x0008,
    GetVersionCfm = 0x0009,
    GetProtocolVersionReq = 0x000A,
    GetProtocolVersionCfm = 0x000B,
    GetStateReq = 0x000C,
    GetStateCfm = 0x000D,
    LeaveLearnStateReq = 0x000E,
    LeaveLearnStateCfm = 0x000F,
    GetNetworkSetupReq = 0x00E0,
    GetNetworkSetupCfm = 0x00E1,
    SetNetworkSetupReq = 0x00E2,
    SetNetworkSetupCfm = 0x00E3,
    CsGetSystemtableDataReq = 0x0100,
    CsGetSystemtableDataCfm = 0x0101,
    CsGetSystemtableDataNtf = 0x0102,
    CsDiscoverNodesReq = 0x0103,
    CsDiscoverNodesCfm = 0x0104,
    CsDiscoverNodesNtf = 0x0105,
    CsRemoveNodesReq = 0x0106,
    CsRemoveNodesCfm = 0x0107,
    CsVirginStateReq = 0x0108,
    CsVirginStateCfm = 0x0109,
    CsControllerCopyReq = 0x010A,
    CsControllerCopyCfm = 0x010B,
    CsControllerCopyNtf = 0x010C,
    CsControllerCopyCancelNtf = 0x010D,
    CsReceiveKeyReq = 0x010E,
    CsReceiveKeyCfm = 0x010F,
    CsReceiveKeyNtf = 0x0110,
    CsPgcJobNtf = 0x0111,
    CsSystemTableUpdateNtf = 0x0112,
    CsGenerateNewKeyReq = 0x0113,
    CsGenerateNewKeyCfm = 0x0114,
    CsGenerateNewKeyNtf = 0x0115,
    CsRepairKeyReq = 0x0116,
    CsRepairKeyCfm = 0x0117,
    CsRepairKeyNtf = 0x0118,
    CsActivateConfigurationModeReq = 0x0119,
    CsActivateConfigurationModeCfm = 0x011A,
    GetNodeInformationReq = 0x0200,
    GetNodeInformationCfm = 0x0201,
    GetNodeInformationNtf = 0x0210,
    GetAllNodesInformationReq = 0x0202,
    GetAllNodesInformationCfm = 0x0203,
    GetAllNodesInformationNtf = 0x0204,
    GetAllNodesInformationFinishedNtf = 0x0205,
    SetNodeVariationReq = 0x0206,
    SetNodeVariationCfm = 0x0207,
    SetNodeNameReq = 0x0208,
    SetNodeNameCfm = 0x0209,
    SetNodeVelocityReq = 0x020A,
    SetNodeVelocityCfm = 0x020B,
    NodeInformationChangedNtf = 0x020C,
    NodeStatePositionChangedNtf = 0x0211,
    SetNodeOrderAndPlacementReq = 0x020D,
    SetNodeOrderAndPlacementCfm = 0x020E,
    GetGroupInformationReq = 0x0220,
    GetGroupInformationCfm = 0x0221,
    GetGroupInformationNtf = 0x0230,
    SetGroupInformationReq = 0x0222,
    SetGroupInformationCfm = 0x0223,
    GroupInformationChangedNtf = 0x0224,
    DeleteGroupReq = 0x0225,
    DeleteGroupCfm = 0x0226,
    NewGroupReq = 0x0227,
    NewGroupCfm = 0x0228,
    GetAllGroupsInformationReq = 0x0229,
    GetAllGroupsInformationCfm = 0x022A,
    GetAllGroupsInformationNtf = 0x022B,
    GetAllGroupsInformationFinishedNtf = 0x022C,
    GroupDeletedNtf = 0x022D,
    HouseStatusMonitorEnableReq = 0x0240,
    HouseStatusMonitorEnableCfm = 0x0241,
    HouseStatusMonitorDisableReq = 0x0242,
    HouseStatusMonitorDisableCfm = 0x0243,
    CommandSendReq = 0x0300,
    CommandSendCfm = 0x0301,
    CommandRunStatusNtf = 0x0302,
    CommandRemainingTimeNtf = 0x0303,
    SessionFinishedNtf = 0x0304,
    StatusRequestReq = 0x0305,
    StatusRequestCfm = 0x0306,
    StatusRequestNtf = 0x0307,
    WinkSendReq = 0x0308,
    WinkSendCfm = 0x0309,
    WinkSendNtf = 0x030A,
    SetLimitationReq = 0x0310,
    SetLimitationCfm = 0x0311,
    GetLimitationStatusReq = 0x0312,
    GetLimitationStatusCfm = 0x0313,
    LimitationStatusNtf = 0x0314,
    ModeSendReq = 0x0320,
    ModeSendCfm = 0x0321,
    ModeSendNtf = 0x0322,
    InitializeSceneReq = 0x0400,
    InitializeSceneCfm = 0x0401,
    InitializeSceneNtf = 0x0402,
    InitializeSceneCancelReq = 0x0403,
    InitializeSceneCancelCfm = 0x0404,
    RecordSceneReq = 0x0405,
    RecordSceneCfm = 0x0406,
    RecordSceneNtf = 0x0407,
    DeleteSceneReq = 0x0408,
    DeleteSceneCfm = 0x0409,
    RenameSceneReq = 0x040A,
    RenameSceneCfm = 0x040B,
    GetSceneListReq = 0x040C,
    GetSceneListCfm = 0x040D,
    GetSceneListNtf = 0x040E,
    GetSceneInformationReq = 0x040F,
    GetSceneInformationCfm = 0x0410,
    GetSceneInformationNtf = 0x0411,
    ActivateSceneReq = 0x0412,
    ActivateSceneCfm = 0x0413,
    StopSceneReq = 0x0415,
    StopSceneCfm = 0x0416,
    SceneInformationChangedNtf = 0x0419,
    ActivateProductgroupReq = 0x0447,
    ActivateProductgroupCfm = 0x0448,
    ActivateProductgroupNtf = 0x0449,
    GetContactInputLinkListReq = 0x0460,
    GetContactInputLinkListCfm = 0x0461,
    SetContactInputLinkReq = 0x0462,
    SetContactInputLinkCfm = 0x0463,
    RemoveContactInputLinkReq = 0x0464,
    RemoveContactInputLinkCfm = 0x0465,
    GetActivationLogHeaderReq = 0x0500,
    GetActivationLogHeaderCfm = 0x0501,
    ClearActivationLogReq = 0x0502,
    ClearActivationLogCfm = 0x0503,
    GetActivationLogLineReq = 0x0504,
    GetActivationLogLineCfm = 0x0505,
    ActivationLogUpdatedNtf = 0x0506,
    GetMultipleActivationLogLinesReq = 0x0507,
    GetMultipleActivationLogLinesNtf = 0x0508,
    GetMultipleActivationLogLinesCfm = 0x0509,
    SetUtcReq = 0x2000,
    SetUtcCfm = 0x2001,
    RtcSetTimeZoneReq = 0x2002,
    RtcSetTimeZoneCfm = 0x2003,
    GetLocalTimeReq = 0x2004,
    GetLocalTimeCfm = 0x2005,
    PasswordEnterReq = 0x3000,
    PasswordEnterCfm = 0x3001,
    PasswordChangeReq = 0x3002,
    PasswordChangeCfm = 0x3003,
    PasswordChangeNtf = 0x3004,
}

impl Command {
    /// The raw wire value.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Look up a wire value in the command table.
    pub fn from_u16(value: u16) -> Option<Command> {
        use Command::*;
        let command = match value {
            0xFFFF => Unset,
            0x0000 => ErrorNtf,
            0x0001 => RebootReq,
            0x0002 => RebootCfm,
            0x0003 => SetFactoryDefaultReq,
            0x0004 => SetFactoryDefaultCfm,
            0x0008 => GetVersionReq,
            0x0009 => GetVersionCfm,
            0x000A => GetProtocolVersionReq,
            0x000B => GetProtocolVersionCfm,
            0x000C => GetStateReq,
            0x000D => GetStateCfm,
            0x000E => LeaveLearnStateReq,
            0x000F => LeaveLearnStateCfm,
            0x00E0 => GetNetworkSetupReq,
            0x00E1 => GetNetworkSetupCfm,
            0x00E2 => SetNetworkSetupReq,
            0x00E3 => SetNetworkSetupCfm,
            0x0100 => CsGetSystemtableDataReq,
            0x0101 => CsGetSystemtableDataCfm,
            0x0102 => CsGetSystemtableDataNtf,
            0x0103 => CsDiscoverNodesReq,
            0x0104 => CsDiscoverNodesCfm,
            0x0105 => CsDiscoverNodesNtf,
            0x0106 => CsRemoveNodesReq,
            0x0107 => CsRemoveNodesCfm,
            0x0108 => CsVirginStateReq,
            0x0109 => CsVirginStateCfm,
            0x010A => CsControllerCopyReq,
            0x010B => CsControllerCopyCfm,
            0x010C => CsControllerCopyNtf,
            0x010D => CsControllerCopyCancelNtf,
            0x010E => CsReceiveKeyReq,
            0x010F => CsReceiveKeyCfm,
            0x0110 => CsReceiveKeyNtf,
            0x0111 => CsPgcJobNtf,
            0x0112 => CsSystemTableUpdateNtf,
            0x0113 => CsGenerateNewKeyReq,
            0x0114 => CsGenerateNewKeyCfm,
            0x0115 => CsGenerateNewKeyNtf,
            0x0116 => CsRepairKeyReq,
            0x0117 => CsRepairKeyCfm,
            0x0118 => CsRepairKeyNtf,
            0x0119 => CsActivateConfigurationModeReq,
            0x011A => CsActivateConfigurationModeCfm,
            0x0200 => GetNodeInformationReq,
            0x0201 => GetNodeInformationCfm,
            0x0210 => GetNodeInformationNtf,
            0x0202 => GetAllNodesInformationReq,
            0x0203 => GetAllNodesInformationCfm,
            0x0204 => GetAllNodesInformationNtf,
            0x0205 => GetAllNodesInformationFinishedNtf,
            0x0206 => SetNodeVariationReq,
            0x0207 => SetNodeVariationCfm,
            0x0208 => SetNodeNameReq,
            0x0209 => SetNodeNameCfm,
            0x020A => SetNodeVelocityReq,
            0x020B => SetNodeVelocityCfm,
            0x020C => NodeInformationChangedNtf,
            0x0211 => NodeStatePositionChangedNtf,
            0x020D => SetNodeOrderAndPlacementReq,
            0x020E => SetNodeOrderAndPlacementCfm,
            0x0220 => GetGroupInformationReq,
            0x0221 => GetGroupInformationCfm,
            0x0230 => GetGroupInformationNtf,
            0x0222 => SetGroupInformationReq,
            0x0223 => SetGroupInformationCfm,
            0x0224 => GroupInformationChangedNtf,
            0x0225 => DeleteGroupReq,
            0x0226 => DeleteGroupCfm,
            0x0227 => NewGroupReq,
            0x0228 => NewGroupCfm,
            0x0229 => GetAllGroupsInformationReq,
            0x022A => GetAllGroupsInformationCfm,
            0x022B => GetAllGroupsInformationNtf,
            0x022C => GetAllGroupsInformationFinishedNtf,
            0x022D => GroupDeletedNtf,
            0x0240 => HouseStatusMonitorEnableReq,
            0x0241 => HouseStatusMonitorEnableCfm,
            0x0242 => HouseStatusMonitorDisableReq,
            0x0243 => HouseStatusMonitorDisableCfm,
            0x0300 => CommandSendReq,
            0x0301 => CommandSendCfm,
            0x0302 => CommandRunStatusNtf,
            0x0303 => CommandRemainingTimeNtf,
            0x0304 => SessionFinishedNtf,
            0x0305 => StatusRequestReq,
            0x0306 => StatusRequestCfm,
            0x0307 => StatusRequestNtf,
            0x0308 => WinkSendReq,
            0x0309 => WinkSendCfm,
            0x030A => WinkSendNtf,
            0x0310 => SetLimitationReq,
            0x0311 => SetLimitationCfm,
            0x0312 => GetLimitationStatusReq,
            0x0313 => GetLimitationStatusCfm,
            0x0314 => LimitationStatusNtf,
            0x0320 => ModeSendReq,
            0x0321 => ModeSendCfm,
            0x0322 => ModeSendNtf,
            0x0400 => InitializeSceneReq,
            0x0401 => InitializeSceneCfm,
            0x0402 => InitializeSceneNtf,
            0x0403 => InitializeSceneCancelReq,
            0x0404 => InitializeSceneCancelCfm,
            0x0405 => RecordSceneReq,
            0x0406 => RecordSceneCfm,
            0x0407 => RecordSceneNtf,
            0x0408 => DeleteSceneReq,
            0x0409 => DeleteSceneCfm,
            0x040A => RenameSceneReq,
            0x040B => RenameSceneCfm,
            0x040C => GetSceneListReq,
            0x040D => GetSceneListCfm,
            0x040E => GetSceneListNtf,
            0x040F => GetSceneInformationReq,
            0x0410 => GetSceneInformationCfm,
            0x0411 => GetSceneInformationNtf,
            0x0412 => ActivateSceneReq,
            0x0413 => ActivateSceneCfm,
            0x0415 => StopSceneReq,
            0x0416 => StopSceneCfm,
            0x0419 => SceneInformationChangedNtf,
            0x0447 => ActivateProductgroupReq,
            0x0448 => ActivateProductgroupCfm,
            0x0449 => ActivateProductgroupNtf,
            0x0460 => GetContactInputLinkListReq,
            0x0461 => GetContactInputLinkListCfm,
            0x0462 => SetContactInputLinkReq,
            0x0463 => SetContactInputLinkCfm,
            0x0464 => RemoveContactInputLinkReq,
            0x0465 => RemoveContactInputLinkCfm,
            0x0500 => GetActivationLogHeaderReq,
            0x0501 => GetActivationLogHeaderCfm,
            0x0502 => ClearActivationLogReq,
            0x0503 => ClearActivationLogCfm,
            0x0504 => GetActivationLogLineReq,
            0x0505 => GetActivationLogLineCfm,
            0x0506 => ActivationLogUpdatedNtf,
            0x0507 => GetMultipleActivationLogLinesReq,
            0x0508 => GetMultipleActivationLogLinesNtf,
            0x0509 => GetMultipleActivationLogLinesCfm,
            0x2000 => SetUtcReq,
            0x2001 => SetUtcCfm,
            0x2002 => RtcSetTimeZoneReq,
            0x2003 => RtcSetTimeZoneCfm,
            0x2004 => GetLocalTimeReq,
            0x2005 => GetLocalTimeCfm,
            0x3000 => PasswordEnterReq,
            0x3001 => PasswordEnterCfm,
            0x3002 => PasswordChangeReq,
            0x3003 => PasswordChangeCfm,
            0x3004 => PasswordChangeNtf,
            _ => return None,
        };
        Some(command)
    }

    /// The confirm command expected in reply to a request command.
    ///
    /// Returns [`Command::Unset`] for commands that are not requests or
    /// whose request has no synchronous confirm.
    pub fn confirm(self) -> Command {
        use Command::*;
        match self {
            RebootReq => RebootCfm,
            SetFactoryDefaultReq => SetFactoryDefaultCfm,
            GetVersionReq => GetVersionCfm,
            GetProtocolVersionReq => GetProtocolVersionCfm,
            GetStateReq => GetStateCfm,
            LeaveLearnStateReq => LeaveLearnStateCfm,
            GetNetworkSetupReq => GetNetworkSetupCfm,
            SetNetworkSetupReq => SetNetworkSetupCfm,
            CsGetSystemtableDataReq => CsGetSystemtableDataCfm,
            CsDiscoverNodesReq => CsDiscoverNodesCfm,
            CsRemoveNodesReq => CsRemoveNodesCfm,
            CsVirginStateReq => CsVirginStateCfm,
            CsControllerCopyReq => CsControllerCopyCfm,
            CsReceiveKeyReq => CsReceiveKeyCfm,
            CsGenerateNewKeyReq => CsGenerateNewKeyCfm,
            CsRepairKeyReq => CsRepairKeyCfm,
            CsActivateConfigurationModeReq => CsActivateConfigurationModeCfm,
            GetNodeInformationReq => GetNodeInformationCfm,
            GetAllNodesInformationReq => GetAllNodesInformationCfm,
            SetNodeVariationReq => SetNodeVariationCfm,
            SetNodeNameReq => SetNodeNameCfm,
            SetNodeVelocityReq => SetNodeVelocityCfm,
            SetNodeOrderAndPlacementReq => SetNodeOrderAndPlacementCfm,
            GetGroupInformationReq => GetGroupInformationCfm,
            SetGroupInformationReq => SetGroupInformationCfm,
            DeleteGroupReq => DeleteGroupCfm,
            NewGroupReq => NewGroupCfm,
            GetAllGroupsInformationReq => GetAllGroupsInformationCfm,
            HouseStatusMonitorEnableReq => HouseStatusMonitorEnableCfm,
            HouseStatusMonitorDisableReq => HouseStatusMonitorDisableCfm,
            CommandSendReq => CommandSendCfm,
            StatusRequestReq => StatusRequestCfm,
            WinkSendReq => WinkSendCfm,
            SetLimitationReq => SetLimitationCfm,
            GetLimitationStatusReq => GetLimitationStatusCfm,
            ModeSendReq => ModeSendCfm,
            InitializeSceneReq => InitializeSceneCfm,
            InitializeSceneCancelReq => InitializeSceneCancelCfm,
            RecordSceneReq => RecordSceneCfm,
            DeleteSceneReq => DeleteSceneCfm,
            RenameSceneReq => RenameSceneCfm,
            GetSceneListReq => GetSceneListCfm,
            GetSceneInformationReq => GetSceneInformationCfm,
            ActivateSceneReq => ActivateSceneCfm,
            StopSceneReq => StopSceneCfm,
            ActivateProductgroupReq => ActivateProductgroupCfm,
            GetContactInputLinkListReq => GetContactInputLinkListCfm,
            SetContactInputLinkReq => SetContactInputLinkCfm,
            RemoveContactInputLinkReq => RemoveContactInputLinkCfm,
            GetActivationLogHeaderReq => GetActivationLogHeaderCfm,
            GetMultipleActivationLogLinesReq => GetMultipleActivationLogLinesCfm,
            SetUtcReq => SetUtcCfm,
            RtcSetTimeZoneReq => RtcSetTimeZoneCfm,
            GetLocalTimeReq => GetLocalTimeCfm,
            PasswordEnterReq => PasswordEnterCfm,
            PasswordChangeReq => PasswordChangeCfm,
            _ => Unset,
        }
    }

    /// The payload offset of the node id for node-scoped commands.
    pub(crate) fn node_id_offset(self) -> Option<usize> {
        use Command::*;
        match self {
            LimitationStatusNtf => Some(2),
            GetNodeInformationCfm
            | SetNodeVariationCfm
            | SetNodeNameCfm
            | SetNodeOrderAndPlacementCfm => Some(1),
            GetNodeInformationReq
            | GetNodeInformationNtf
            | SetNodeVariationReq
            | SetNodeNameReq
            | NodeInformationChangedNtf
            | NodeStatePositionChangedNtf
            | GetAllNodesInformationNtf
            | SetNodeOrderAndPlacementReq => Some(0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_value_roundtrip() {
        for value in 0x0000..=0x3004u16 {
            if let Some(command) = Command::from_u16(value) {
                assert_eq!(command.as_u16(), value);
            }
        }
        assert_eq!(Command::from_u16(0xFFFF), Some(Command::Unset));
    }

    #[test]
    fn unknown_values_are_rejected() {
        assert_eq!(Command::from_u16(0x0005), None);
        assert_eq!(Command::from_u16(0x1234), None);
        assert_eq!(Command::from_u16(0x3005), None);
    }

    #[test]
    fn request_maps_to_confirm() {
        assert_eq!(Command::PasswordEnterReq.confirm(), Command::PasswordEnterCfm);
        assert_eq!(Command::GetVersionReq.confirm(), Command::GetVersionCfm);
        assert_eq!(
            Command::SetNetworkSetupReq.confirm(),
            Command::SetNetworkSetupCfm
        );
        assert_eq!(
            Command::GetAllNodesInformationReq.confirm(),
            Command::GetAllNodesInformationCfm
        );
    }

    #[test]
    fn unmapped_commands_yield_unset() {
        // Notifications and confirms never expect a confirm of their own.
        assert_eq!(Command::ErrorNtf.confirm(), Command::Unset);
        assert_eq!(Command::GetVersionCfm.confirm(), Command::Unset);
        assert_eq!(Command::SessionFinishedNtf.confirm(), Command::Unset);
        assert_eq!(Command::Unset.confirm(), Command::Unset);
    }
}
